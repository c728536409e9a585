// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Topology Store: transactional reads and writes over
//! clusters, nodes, jobs, and credentials, backed by an in-memory
//! [`TopologyState`] behind a `tokio::sync::RwLock` and persisted via
//! [`SnapshotStore`] on every mutating commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rke2_core::{
    Cluster, ClusterId, Credential, CredentialId, Job, JobId, JobStatus, LockStatus, Node, NodeId, OutputChunk,
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::StoreError;
use crate::snapshot::SnapshotStore;
use crate::state::TopologyState;

pub struct TopologyStore {
    state: RwLock<TopologyState>,
    snapshot: SnapshotStore,
}

impl TopologyStore {
    /// Load the store from its snapshot file (or start empty on first
    /// boot). Does not run startup reconciliation; callers invoke
    /// [`TopologyStore::reconcile_startup`] once, explicitly, after
    /// construction.
    pub fn open(snapshot_path: impl Into<std::path::PathBuf>) -> Result<Arc<Self>, StoreError> {
        let snapshot = SnapshotStore::new(snapshot_path);
        let state = snapshot.load()?;
        Ok(Arc::new(Self { state: RwLock::new(state), snapshot }))
    }

    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(TopologyState::default()),
            snapshot: SnapshotStore::new(std::env::temp_dir().join(format!("rke2-test-{}.json", nanoid::nanoid!(8)))),
        })
    }

    async fn commit(&self, state: &TopologyState) -> Result<(), StoreError> {
        self.snapshot.save(state)
    }

    // -- Clusters ---------------------------------------------------------

    pub async fn insert_cluster(&self, cluster: Cluster) -> Result<Cluster, StoreError> {
        let mut state = self.state.write().await;
        if state.find_cluster_by_name(&cluster.name).is_some() {
            return Err(StoreError::DuplicateClusterName(cluster.name));
        }
        let out = cluster.clone();
        state.clusters.insert(cluster.id, cluster);
        self.commit(&state).await?;
        Ok(out)
    }

    pub async fn get_cluster(&self, id: ClusterId) -> Result<Cluster, StoreError> {
        self.state.read().await.clusters.get(&id).cloned().ok_or(StoreError::ClusterNotFound(id))
    }

    pub async fn list_clusters(&self) -> Vec<Cluster> {
        self.state.read().await.clusters.values().cloned().collect()
    }

    /// Apply `mutate` to the cluster and persist. The closure is given a
    /// mutable reference so callers can update several fields (e.g.
    /// `current_stage` and `updated_at`) in one commit.
    pub async fn update_cluster(
        &self,
        id: ClusterId,
        mutate: impl FnOnce(&mut Cluster),
    ) -> Result<Cluster, StoreError> {
        let mut state = self.state.write().await;
        let cluster = state.clusters.get_mut(&id).ok_or(StoreError::ClusterNotFound(id))?;
        mutate(cluster);
        let out = cluster.clone();
        self.commit(&state).await?;
        Ok(out)
    }

    /// Cascade delete: removes the cluster plus every node and job that
    /// references it.
    pub async fn delete_cluster(&self, id: ClusterId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.clusters.remove(&id).is_none() {
            return Err(StoreError::ClusterNotFound(id));
        }
        state.nodes.retain(|_, n| n.cluster_id != id);
        state.jobs.retain(|_, j| j.cluster_id != id);
        self.commit(&state).await?;
        Ok(())
    }

    // -- Nodes --------------------------------------------------------------

    pub async fn insert_node(&self, node: Node) -> Result<Node, StoreError> {
        let mut state = self.state.write().await;
        state.check_node_identity_unique(
            node.cluster_id,
            &node.hostname,
            &node.internal_address,
            node.external_address.as_deref(),
            None,
        )?;
        let out = node.clone();
        state.nodes.insert(node.id, node);
        self.commit(&state).await?;
        Ok(out)
    }

    pub async fn get_node(&self, id: NodeId) -> Result<Node, StoreError> {
        self.state.read().await.nodes.get(&id).cloned().ok_or(StoreError::NodeNotFound(id))
    }

    pub async fn list_nodes(&self, cluster_id: ClusterId) -> Vec<Node> {
        self.state.read().await.nodes_for_cluster(cluster_id).cloned().collect()
    }

    pub async fn update_node(&self, id: NodeId, mutate: impl FnOnce(&mut Node)) -> Result<Node, StoreError> {
        let mut state = self.state.write().await;
        let node = state.nodes.get_mut(&id).ok_or(StoreError::NodeNotFound(id))?;
        mutate(node);
        let out = node.clone();
        self.commit(&state).await?;
        Ok(out)
    }

    // -- Jobs ---------------------------------------------------------------

    pub async fn insert_job(&self, job: Job) -> Result<Job, StoreError> {
        let mut state = self.state.write().await;
        let out = job.clone();
        state.jobs.insert(job.id, job);
        self.commit(&state).await?;
        Ok(out)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job, StoreError> {
        self.state.read().await.jobs.get(&id).cloned().ok_or(StoreError::JobNotFound(id))
    }

    pub async fn list_jobs(&self, cluster_id: Option<ClusterId>) -> Vec<Job> {
        let state = self.state.read().await;
        match cluster_id {
            Some(cid) => state.jobs_for_cluster(cid).cloned().collect(),
            None => state.jobs.values().cloned().collect(),
        }
    }

    pub async fn update_job(&self, id: JobId, mutate: impl FnOnce(&mut Job)) -> Result<Job, StoreError> {
        let mut state = self.state.write().await;
        let job = state.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        mutate(job);
        let out = job.clone();
        self.commit(&state).await?;
        Ok(out)
    }

    /// Append an output chunk to a job's persisted buffer, returning the
    /// assigned chunk (same sequence number the Event Bus publishes).
    pub async fn append_job_chunk(
        &self,
        id: JobId,
        stream: rke2_core::ChunkStream,
        line: String,
        emitted_at: DateTime<Utc>,
    ) -> Result<OutputChunk, StoreError> {
        let mut state = self.state.write().await;
        let job = state.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        let chunk = job.append_chunk(stream, line, emitted_at);
        self.commit(&state).await?;
        Ok(chunk)
    }

    // -- Credentials ----------------------------------------------------------

    pub async fn insert_credential(&self, credential: Credential) -> Result<Credential, StoreError> {
        let mut state = self.state.write().await;
        let out = credential.clone();
        state.credentials.insert(credential.id, credential);
        self.commit(&state).await?;
        Ok(out)
    }

    pub async fn get_credential(&self, id: CredentialId) -> Result<Credential, StoreError> {
        self.state.read().await.credentials.get(&id).cloned().ok_or(StoreError::CredentialNotFound(id))
    }

    // -- Lock -----------------------------------------------------------------

    /// Acquire the cluster's exclusive lock. Fails fast (never blocks) with
    /// [`StoreError::AlreadyLocked`] if `status` is already `running`. All
    /// four lock fields are set in the same commit.
    pub async fn acquire_lock(
        &self,
        cluster_id: ClusterId,
        job_id: JobId,
        operation_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let cluster = state.clusters.get_mut(&cluster_id).ok_or(StoreError::ClusterNotFound(cluster_id))?;
        if !cluster.lock.is_idle() {
            return Err(StoreError::AlreadyLocked(cluster_id));
        }
        cluster.lock.status = LockStatus::Running;
        cluster.lock.current_job = Some(job_id);
        cluster.lock.operation_name = Some(operation_name.into());
        cluster.lock.started_at = Some(now);
        self.commit(&state).await?;
        Ok(())
    }

    /// Release the cluster's lock back to idle. Idempotent: releasing an
    /// already-idle lock is a no-op success.
    pub async fn release_lock(&self, cluster_id: ClusterId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let cluster = state.clusters.get_mut(&cluster_id).ok_or(StoreError::ClusterNotFound(cluster_id))?;
        if cluster.lock.is_idle() {
            return Ok(());
        }
        cluster.lock = rke2_core::LockRecord::idle();
        self.commit(&state).await?;
        Ok(())
    }

    /// Read-only snapshot of the whole topology, used by the engine's pure
    /// guardrail predicates (§4.4) without holding the store lock across
    /// their evaluation.
    pub async fn snapshot(&self) -> TopologyState {
        self.state.read().await.clone()
    }

    /// Startup reconciliation: any cluster whose lock is
    /// `running` but whose `current_job` is not actually `running` is
    /// rehabilitated — the job is marked `failed` ("orphaned by restart")
    /// and the lock released. Runs once at startup. Returns the
    /// `(cluster_id, job_id)` pairs rehabilitated, for the caller to log.
    pub async fn reconcile_startup(&self, now: DateTime<Utc>) -> Result<Vec<(ClusterId, JobId)>, StoreError> {
        let mut state = self.state.write().await;
        let mut rehabilitated = Vec::new();

        let stuck: Vec<ClusterId> = state
            .clusters
            .values()
            .filter(|c| {
                c.lock.status == LockStatus::Running
                    && c.lock
                        .current_job
                        .is_none_or(|jid| state.jobs.get(&jid).is_none_or(|j| j.status != JobStatus::Running))
            })
            .map(|c| c.id)
            .collect();

        for cluster_id in stuck {
            let Some(cluster) = state.clusters.get_mut(&cluster_id) else { continue };
            let job_id = cluster.lock.current_job;
            cluster.lock = rke2_core::LockRecord::idle();
            cluster.current_stage = None;

            if let Some(job_id) = job_id {
                if let Some(job) = state.jobs.get_mut(&job_id) {
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(now);
                    job.append_chunk(
                        rke2_core::ChunkStream::Stderr,
                        "orphaned by restart".to_string(),
                        now,
                    );
                }
                warn!(cluster_id = %cluster_id, job_id = %job_id, "rehabilitated orphaned lock at startup");
                rehabilitated.push((cluster_id, job_id));
            }
        }

        if !rehabilitated.is_empty() {
            self.commit(&state).await?;
        }
        Ok(rehabilitated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rke2_core::{ClusterBuilder, JobBuilder, JobKind};

    #[tokio::test]
    async fn acquire_lock_fails_when_already_running() {
        let store = TopologyStore::in_memory();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let job = store.insert_job(JobBuilder::default().cluster_id(cluster.id).kind(JobKind::Install).build()).await.unwrap();

        store.acquire_lock(cluster.id, job.id, "install", Utc::now()).await.unwrap();
        let err = store.acquire_lock(cluster.id, job.id, "install", Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyLocked(_)));
    }

    #[tokio::test]
    async fn release_lock_is_idempotent() {
        let store = TopologyStore::in_memory();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        store.release_lock(cluster.id).await.unwrap();
        store.release_lock(cluster.id).await.unwrap();
        let c = store.get_cluster(cluster.id).await.unwrap();
        assert!(c.lock.is_idle());
    }

    #[tokio::test]
    async fn reconcile_startup_fails_orphaned_job_and_releases_lock() {
        let store = TopologyStore::in_memory();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let job = store
            .insert_job(JobBuilder::default().cluster_id(cluster.id).kind(JobKind::Install).build())
            .await
            .unwrap();
        store.acquire_lock(cluster.id, job.id, "install", Utc::now()).await.unwrap();

        // Simulate an abrupt restart: lock says running, but the job row
        // itself never reached `running` (process died before updating it).
        let rehabilitated = store.reconcile_startup(Utc::now()).await.unwrap();
        assert_eq!(rehabilitated, vec![(cluster.id, job.id)]);

        let cluster = store.get_cluster(cluster.id).await.unwrap();
        assert!(cluster.lock.is_idle());
        let job = store.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.output.iter().any(|c| c.line.contains("orphaned by restart")));
    }

    #[tokio::test]
    async fn reconcile_startup_leaves_genuinely_running_jobs_alone() {
        let store = TopologyStore::in_memory();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let job = store
            .insert_job(JobBuilder::default().cluster_id(cluster.id).kind(JobKind::Install).status(JobStatus::Running).build())
            .await
            .unwrap();
        store.acquire_lock(cluster.id, job.id, "install", Utc::now()).await.unwrap();

        let rehabilitated = store.reconcile_startup(Utc::now()).await.unwrap();
        assert!(rehabilitated.is_empty());
        let cluster = store.get_cluster(cluster.id).await.unwrap();
        assert!(!cluster.lock.is_idle());
    }

    #[tokio::test]
    async fn delete_cluster_cascades_to_nodes_and_jobs() {
        let store = TopologyStore::in_memory();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let node = store
            .insert_node(rke2_core::NodeBuilder::default().cluster_id(cluster.id).hostname("n1").build())
            .await
            .unwrap();
        store.insert_job(JobBuilder::default().cluster_id(cluster.id).build()).await.unwrap();

        store.delete_cluster(cluster.id).await.unwrap();
        assert!(store.get_cluster(cluster.id).await.is_err());
        assert!(store.get_node(node.id).await.is_err());
        assert!(store.list_jobs(Some(cluster.id)).await.is_empty());
    }

    #[tokio::test]
    async fn insert_node_rejects_duplicate_hostname() {
        let store = TopologyStore::in_memory();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        store
            .insert_node(rke2_core::NodeBuilder::default().cluster_id(cluster.id).hostname("n1").internal_address("10.0.0.1").build())
            .await
            .unwrap();
        let err = store
            .insert_node(rke2_core::NodeBuilder::default().cluster_id(cluster.id).hostname("n1").internal_address("10.0.0.2").build())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHostname { .. }));
    }
}
