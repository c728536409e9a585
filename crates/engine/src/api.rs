// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job API Surface: `JobApi` is the transport-agnostic
//! public contract. `rke2-daemon`'s axum handlers are a thin translation
//! layer over this struct; no business logic lives in the HTTP layer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rke2_adapters::{Analyzer, ClusterStatusProbe, CredentialStore, PlaybookProcess, PortProbe};
use rke2_core::{
    ApiError, Cluster, ClusterId, ClusterKind, CredentialId, ImageOverrides, Job, JobId, JobKind, JobStatus,
    LockRecord, NetworkPlugin, Node, NodeId, NodeStatus, RegistrySettings,
};
use rke2_storage::{StoreError, TopologyStore};
use tracing::{info, warn};

use crate::event_bus::{EventBus, JobOutputStream};
use crate::guardrails::{self, GuardrailRejection, NodeSpec};
use crate::lock::{LockConflict, LockManager};
use crate::orchestrator::{plan_stages, StageOrchestrator};
use crate::runner::JobRunner;

fn store_err(e: StoreError) -> ApiError {
    ApiError::StoreError(e.to_string())
}

fn guardrail_err(e: GuardrailRejection) -> ApiError {
    ApiError::GuardrailRejection { guardrail: e.guardrail, reason: e.reason }
}

fn lock_err(e: LockConflict) -> ApiError {
    match e {
        LockConflict::Busy { cluster_id, operation_name, current_job } => {
            ApiError::Conflict { cluster_id, operation_name, current_job }
        }
        LockConflict::Store(e) => store_err(e),
    }
}

/// Parameters for creating a fresh or registering an existing cluster
/// (`POST /clusters/new` / `POST /clusters/register`).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewClusterParams {
    pub name: String,
    pub target_version: String,
    pub network_plugin: NetworkPlugin,
    pub control_plane_endpoint: String,
    pub bootstrap_token: String,
    pub credential_id: CredentialId,
    pub registry: Option<RegistrySettings>,
    pub image_overrides: Option<ImageOverrides>,
    pub san_list: Option<Vec<String>>,
}

/// Result of `add_nodes` when the request mixes control-plane and worker
/// nodes (guardrail G3): only the control-plane job is created; the worker
/// specs are returned uncommitted for the caller to resubmit once the
/// control-plane job succeeds.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SplitRolesResponse {
    pub master_job_id: Option<JobId>,
    pub worker_job_id: Option<JobId>,
    pub pending_workers: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RemoveNodesResponse {
    pub job_id: JobId,
    pub warnings: Vec<String>,
}

pub struct JobApi {
    store: Arc<TopologyStore>,
    lock_manager: Arc<LockManager>,
    credentials: Arc<dyn CredentialStore>,
    playbooks: Arc<dyn PlaybookProcess>,
    port_probe: Arc<dyn PortProbe>,
    status_probe: Arc<dyn ClusterStatusProbe>,
    analyzer: Option<Arc<dyn Analyzer>>,
    work_dir_root: PathBuf,
    buses: Arc<Mutex<HashMap<JobId, Arc<EventBus>>>>,
}

impl JobApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<TopologyStore>,
        credentials: Arc<dyn CredentialStore>,
        playbooks: Arc<dyn PlaybookProcess>,
        port_probe: Arc<dyn PortProbe>,
        status_probe: Arc<dyn ClusterStatusProbe>,
        analyzer: Option<Arc<dyn Analyzer>>,
        work_dir_root: PathBuf,
    ) -> Self {
        Self {
            lock_manager: Arc::new(LockManager::new(store.clone())),
            store,
            credentials,
            playbooks,
            port_probe,
            status_probe,
            analyzer,
            work_dir_root,
            buses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // -- Cluster CRUD (§6 illustrative bindings) -----------------------------

    pub async fn create_cluster(&self, params: NewClusterParams) -> Result<Cluster, ApiError> {
        self.insert_cluster(params, ClusterKind::Fresh).await
    }

    pub async fn register_cluster(&self, params: NewClusterParams) -> Result<Cluster, ApiError> {
        self.insert_cluster(params, ClusterKind::Registered).await
    }

    async fn insert_cluster(&self, params: NewClusterParams, kind: ClusterKind) -> Result<Cluster, ApiError> {
        let now = Utc::now();
        let cluster = Cluster {
            id: ClusterId::new(),
            name: params.name,
            kind,
            target_version: params.target_version,
            network_plugin: params.network_plugin,
            control_plane_endpoint: params.control_plane_endpoint,
            bootstrap_token: params.bootstrap_token,
            credential_id: params.credential_id,
            san_list: params.san_list,
            registry: params.registry,
            image_overrides: params.image_overrides,
            config_document: None,
            lock: LockRecord::idle(),
            current_stage: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_cluster(cluster).await.map_err(|e| match e {
            StoreError::DuplicateClusterName(name) => {
                ApiError::ValidationError { detail: format!("cluster name '{name}' is already in use") }
            }
            other => store_err(other),
        })
    }

    pub async fn update_cluster(&self, cluster_id: ClusterId, mutate: impl FnOnce(&mut Cluster)) -> Result<Cluster, ApiError> {
        self.store.update_cluster(cluster_id, mutate).await.map_err(|_| ApiError::not_found_cluster(cluster_id))
    }

    pub async fn delete_cluster(&self, cluster_id: ClusterId) -> Result<(), ApiError> {
        let cluster = self.get_cluster(cluster_id).await?;
        if !cluster.lock.is_idle() {
            return Err(ApiError::Conflict {
                cluster_id,
                operation_name: cluster.lock.operation_name.unwrap_or_default(),
                current_job: cluster.lock.current_job.unwrap_or_else(JobId::new),
            });
        }
        self.store.delete_cluster(cluster_id).await.map_err(|_| ApiError::not_found_cluster(cluster_id))
    }

    pub async fn get_cluster(&self, cluster_id: ClusterId) -> Result<Cluster, ApiError> {
        self.store.get_cluster(cluster_id).await.map_err(|_| ApiError::not_found_cluster(cluster_id))
    }

    pub async fn list_clusters(&self) -> Vec<Cluster> {
        self.store.list_clusters().await
    }

    pub async fn status(&self, cluster_id: ClusterId) -> Result<serde_json::Value, ApiError> {
        let cluster = self.get_cluster(cluster_id).await?;
        self.status_probe.status(&cluster).await.map_err(|e| ApiError::RunnerError(e.to_string()))
    }

    pub async fn test_credential_access(&self, credential_id: CredentialId) -> Result<(), ApiError> {
        self.credentials.fetch(credential_id).await.map(|_| ()).map_err(|e| match e {
            rke2_adapters::CredentialError::NotFound(_) => ApiError::not_found_credential(credential_id),
            other => ApiError::RunnerError(other.to_string()),
        })
    }

    // -- Job API Surface --------------------------------------

    pub async fn install(&self, cluster_id: ClusterId) -> Result<JobId, ApiError> {
        let cluster = self.get_cluster(cluster_id).await?;
        if cluster.kind != ClusterKind::Fresh {
            return Err(ApiError::ValidationError { detail: "install only applies to a fresh cluster".to_string() });
        }
        self.start_job(cluster_id, cluster.credential_id, JobKind::Install, "install", None, &[]).await
    }

    pub async fn uninstall(&self, cluster_id: ClusterId, confirmation_text: &str) -> Result<JobId, ApiError> {
        let cluster = self.get_cluster(cluster_id).await?;
        if confirmation_text != cluster.name {
            return Err(ApiError::ValidationError {
                detail: "confirmation text does not match the cluster name".to_string(),
            });
        }
        self.start_job(cluster_id, cluster.credential_id, JobKind::Uninstall, "uninstall", None, &[]).await
    }

    pub async fn add_nodes(
        &self,
        cluster_id: ClusterId,
        specs: Vec<NodeSpec>,
        confirm_master_removal: bool,
    ) -> Result<SplitRolesResponse, ApiError> {
        let _ = confirm_master_removal; // not consulted by G4/G3/G1; kept for a symmetric call signature with remove_nodes
        let cluster = self.get_cluster(cluster_id).await?;
        let snapshot = self.store.snapshot().await;

        guardrails::g4_node_identity(&snapshot, cluster_id, &specs).map_err(guardrail_err)?;
        let (masters, workers) = guardrails::g3_split_roles(&specs);
        if masters.is_empty() && workers.is_empty() {
            return Err(ApiError::ValidationError { detail: "no nodes supplied".to_string() });
        }
        guardrails::g1_bootstrap_prerequisite(&snapshot, cluster_id, self.port_probe.as_ref())
            .await
            .map_err(guardrail_err)?;

        if !masters.is_empty() {
            let node_ids = self.insert_node_specs(cluster_id, &masters).await?;
            let job_id = self
                .start_job(cluster_id, cluster.credential_id, JobKind::ScaleAddMasters, "scale_add_masters", None, &node_ids)
                .await?;
            return Ok(SplitRolesResponse { master_job_id: Some(job_id), worker_job_id: None, pending_workers: workers });
        }

        let node_ids = self.insert_node_specs(cluster_id, &workers).await?;
        let job_id = self
            .start_job(cluster_id, cluster.credential_id, JobKind::ScaleAddWorkers, "scale_add_workers", None, &node_ids)
            .await?;
        Ok(SplitRolesResponse { master_job_id: None, worker_job_id: Some(job_id), pending_workers: Vec::new() })
    }

    pub async fn remove_nodes(
        &self,
        cluster_id: ClusterId,
        node_ids: Vec<NodeId>,
        confirm_master_removal: bool,
    ) -> Result<RemoveNodesResponse, ApiError> {
        let cluster = self.get_cluster(cluster_id).await?;
        let snapshot = self.store.snapshot().await;
        let warnings = guardrails::g2_safe_removal(&snapshot, cluster_id, &node_ids, confirm_master_removal)
            .map_err(guardrail_err)?;

        let job_id = self
            .start_job(cluster_id, cluster.credential_id, JobKind::ScaleRemove, "scale_remove", None, &node_ids)
            .await?;
        Ok(RemoveNodesResponse { job_id, warnings: warnings.warnings })
    }

    pub async fn preflight_check(
        &self,
        cluster_id: ClusterId,
        analyze: bool,
        target_version: Option<String>,
    ) -> Result<JobId, ApiError> {
        self.run_read_only_check(cluster_id, JobKind::PreflightCheck, "preflight_check", analyze, target_version).await
    }

    pub async fn upgrade_check(
        &self,
        cluster_id: ClusterId,
        analyze: bool,
        target_version: Option<String>,
    ) -> Result<JobId, ApiError> {
        self.run_read_only_check(cluster_id, JobKind::UpgradeCheck, "upgrade_check", analyze, target_version).await
    }

    async fn run_read_only_check(
        &self,
        cluster_id: ClusterId,
        kind: JobKind,
        operation_name: &str,
        analyze: bool,
        target_version: Option<String>,
    ) -> Result<JobId, ApiError> {
        let cluster = self.get_cluster(cluster_id).await?;
        let job_id = self
            .start_job(cluster_id, cluster.credential_id, kind, operation_name, target_version, &[])
            .await?;
        if analyze {
            if let Some(analyzer) = self.analyzer.clone() {
                let store = self.store.clone();
                tokio::spawn(async move {
                    // Best-effort: run once the read-only stage has persisted some
                    // output, independent of the orchestrator task's own lifetime.
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    let document = serde_json::json!({ "cluster_id": cluster_id.to_string() });
                    match analyzer.analyze(&document).await {
                        Ok(response) => {
                            let summary = rke2_core::AnalyzerSummary {
                                verdict: response.verdict,
                                blockers: response.blockers,
                                risks: response.risks,
                                action_plan: response.action_plan,
                                model_id: response.model_id,
                                token_count: response.token_count,
                            };
                            let _ = store.update_job(job_id, |j| j.analyzer_summary = Some(summary)).await;
                        }
                        Err(e) => warn!(job_id = %job_id, error = %e, "analyzer call failed; continuing without a verdict"),
                    }
                });
            }
        }
        Ok(job_id)
    }

    pub async fn cancel(&self, job_id: JobId) -> Result<(), ApiError> {
        let job = self.get_job(job_id).await?;
        if job.status.is_terminal() {
            return Ok(());
        }
        self.store.update_job(job_id, |j| j.cancel_requested = true).await.map_err(store_err)?;
        Ok(())
    }

    pub async fn stream(&self, job_id: JobId) -> Result<JobOutputStream, ApiError> {
        let job = self.get_job(job_id).await?;
        let bus = self.buses.lock().get(&job_id).cloned();
        match bus {
            Some(bus) => Ok(bus.subscribe(self.store.clone(), job_id, job.output)),
            None => {
                let bus = EventBus::new();
                bus.close();
                Ok(bus.subscribe(self.store.clone(), job_id, job.output))
            }
        }
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Job, ApiError> {
        self.store.get_job(job_id).await.map_err(|_| ApiError::not_found_job(job_id))
    }

    pub async fn list_jobs(&self, cluster_id: Option<ClusterId>) -> Vec<Job> {
        self.store.list_jobs(cluster_id).await
    }

    // -- Internal plumbing ----------------------------------------------------

    async fn insert_node_specs(&self, cluster_id: ClusterId, specs: &[NodeSpec]) -> Result<Vec<NodeId>, ApiError> {
        let mut ids = Vec::with_capacity(specs.len());
        for spec in specs {
            let node = Node {
                id: NodeId::new(),
                cluster_id,
                hostname: spec.hostname.clone(),
                internal_address: spec.internal_address.clone(),
                external_address: spec.external_address.clone(),
                use_external: spec.use_external,
                role: spec.role,
                status: NodeStatus::Pending,
                install_started_at: None,
                install_ended_at: None,
                last_error: None,
                variables: std::collections::HashMap::new(),
            };
            let node = self.store.insert_node(node).await.map_err(store_err)?;
            ids.push(node.id);
        }
        Ok(ids)
    }

    /// Creates the job row, acquires the cluster lock (skipped for
    /// read-only kinds, see `JobKind::is_read_only` and DESIGN.md),
    /// and spawns the orchestrator as a detached task. Returns the job id
    /// immediately; the caller observes progress via `stream`/`get_job`.
    async fn start_job(
        &self,
        cluster_id: ClusterId,
        credential_id: CredentialId,
        kind: JobKind,
        operation_name: &str,
        target_version: Option<String>,
        target_node_ids: &[NodeId],
    ) -> Result<JobId, ApiError> {
        let now = Utc::now();
        let job = Job {
            id: JobId::new(),
            cluster_id,
            kind,
            status: JobStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            output: Vec::new(),
            readiness_result: None,
            analyzer_summary: None,
            target_version,
            cancel_requested: false,
            next_chunk_seq: 0,
        };
        let job = self.store.insert_job(job).await.map_err(store_err)?;

        let guard = if kind.is_read_only() {
            None
        } else {
            Some(self.lock_manager.acquire(cluster_id, job.id, operation_name).await.map_err(lock_err)?)
        };

        let bus = Arc::new(EventBus::new());
        self.buses.lock().insert(job.id, bus.clone());

        let all_nodes = self.store.list_nodes(cluster_id).await;
        let stages = plan_stages(kind, &all_nodes, target_node_ids);
        let runner = Arc::new(JobRunner::new(self.store.clone(), self.credentials.clone(), self.playbooks.clone(), bus.clone()));
        let orchestrator = StageOrchestrator::new(self.store.clone(), runner, self.work_dir_root.clone());
        let store = self.store.clone();
        let buses = self.buses.clone();
        let job_id = job.id;

        info!(job_id = %job_id, cluster_id = %cluster_id, operation = %operation_name, "job scheduled");
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(job_id, cluster_id, credential_id, stages).await {
                warn!(job_id = %job_id, error = %e, "orchestrator run failed before reaching a terminal status");
                let _ = store
                    .update_job(job_id, |j| {
                        j.status = JobStatus::Failed;
                        j.completed_at = Some(Utc::now());
                    })
                    .await;
            }
            bus.close();
            buses.lock().remove(&job_id);
            if let Some(guard) = guard {
                if let Err(e) = guard.release().await {
                    warn!(cluster_id = %cluster_id, error = %e, "failed to release lock after job completion");
                }
            }
        });

        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rke2_adapters::fakes::{
        FakeAnalyzer, FakeCredentialStore, FakePlaybookProcess, FakePortProbe, FakeStatusProbe, ScriptedRun,
    };
    use rke2_core::{ClusterBuilder, NodeBuilder, NodeRole, NodeStatus};
    use tempfile::tempdir;

    /// Returns the API plus the `TempDir` guard for its work-dir root; the
    /// guard must stay alive for the test's duration or the root is deleted.
    fn api(scripts: Vec<ScriptedRun>) -> (JobApi, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let api = JobApi::new(
            TopologyStore::in_memory(),
            Arc::new(FakeCredentialStore::default()),
            Arc::new(FakePlaybookProcess::new(scripts)),
            Arc::new(FakePortProbe::default()),
            Arc::new(FakeStatusProbe),
            Some(Arc::new(FakeAnalyzer::default())),
            dir.path().to_path_buf(),
        );
        (api, dir)
    }

    async fn cluster_with_initial_master(api: &JobApi) -> (Cluster, Node) {
        let cluster = api
            .store
            .insert_cluster(ClusterBuilder::default().name("c1").build())
            .await
            .unwrap();
        let initial = api
            .store
            .insert_node(
                NodeBuilder::default()
                    .cluster_id(cluster.id)
                    .role(NodeRole::InitialMaster)
                    .hostname("m0")
                    .status(NodeStatus::Active)
                    .build(),
            )
            .await
            .unwrap();
        (cluster, initial)
    }

    #[tokio::test]
    async fn install_runs_to_success_and_activates_nodes() {
        let (api, _dir) = api(vec![ScriptedRun::success(["ok"])]);
        let cluster = api.store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let initial = api
            .store
            .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m0").build())
            .await
            .unwrap();

        let job_id = api.install(cluster.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let job = api.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Success);
        let node = api.store.get_node(initial.id).await.unwrap();
        assert_eq!(node.status, NodeStatus::Active);
        let cluster = api.get_cluster(cluster.id).await.unwrap();
        assert!(cluster.lock.is_idle());
    }

    #[tokio::test]
    async fn install_conflicts_while_a_job_already_holds_the_lock() {
        let (api, _dir) = api(vec![ScriptedRun::success(["slow"]), ScriptedRun::success(["ok"])]);
        let cluster = api.store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        api.store
            .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m0").build())
            .await
            .unwrap();

        let _guard = api.lock_manager.acquire(cluster.id, JobId::new(), "install").await.unwrap();
        let err = api.install(cluster.id).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn add_nodes_with_mixed_roles_creates_only_the_master_job() {
        let (api, _dir) = api(vec![ScriptedRun::success(["ok"])]);
        let (cluster, _initial) = cluster_with_initial_master(&api).await;

        let specs = vec![
            NodeSpec {
                hostname: "m1".to_string(),
                internal_address: "10.0.0.2".to_string(),
                external_address: None,
                use_external: false,
                role: NodeRole::Master,
            },
            NodeSpec {
                hostname: "w1".to_string(),
                internal_address: "10.0.0.3".to_string(),
                external_address: None,
                use_external: false,
                role: NodeRole::Worker,
            },
        ];

        let response = api.add_nodes(cluster.id, specs, false).await.unwrap();
        assert!(response.master_job_id.is_some());
        assert!(response.worker_job_id.is_none());
        assert_eq!(response.pending_workers.len(), 1);
        assert_eq!(response.pending_workers[0].hostname, "w1");

        // The worker spec was never inserted as a node row.
        let nodes = api.store.list_nodes(cluster.id).await;
        assert!(!nodes.iter().any(|n| n.hostname == "w1"));
    }

    #[tokio::test]
    async fn remove_nodes_rejects_master_removal_without_confirmation() {
        let (api, _dir) = api(vec![]);
        let cluster = api.store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let master = api
            .store
            .insert_node(
                NodeBuilder::default()
                    .cluster_id(cluster.id)
                    .role(NodeRole::Master)
                    .hostname("m1")
                    .status(NodeStatus::Active)
                    .build(),
            )
            .await
            .unwrap();

        let err = api.remove_nodes(cluster.id, vec![master.id], false).await.unwrap_err();
        assert_eq!(err.kind(), "guardrail_rejection");
    }

    #[tokio::test]
    async fn cancel_on_an_already_terminal_job_is_a_no_op() {
        let (api, _dir) = api(vec![]);
        let cluster = api.store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let job = api
            .store
            .insert_job(rke2_core::JobBuilder::default().cluster_id(cluster.id).status(JobStatus::Success).build())
            .await
            .unwrap();

        api.cancel(job.id).await.unwrap();
        let job = api.get_job(job.id).await.unwrap();
        assert!(!job.cancel_requested);
    }

    #[tokio::test]
    async fn stream_after_job_completion_yields_the_persisted_buffer_then_ends() {
        let (api, _dir) = api(vec![ScriptedRun::success(["line one", "line two"])]);
        let cluster = api.store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        api.store
            .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m0").build())
            .await
            .unwrap();

        let job_id = api.install(cluster.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let mut stream = api.stream(job_id).await.unwrap();
        let mut lines = Vec::new();
        while let Some(chunk) = stream.next().await {
            lines.push(chunk.line);
        }
        assert!(lines.iter().any(|l| l.contains("line one")));
    }

    #[tokio::test]
    async fn preflight_check_does_not_acquire_the_cluster_lock() {
        let (api, _dir) = api(vec![ScriptedRun::success(["preflight ok"])]);
        let cluster = api.store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();

        let job_id = api.preflight_check(cluster.id, false, None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let job = api.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Success);
        let cluster = api.get_cluster(cluster.id).await.unwrap();
        assert!(cluster.lock.is_idle());
    }
}
