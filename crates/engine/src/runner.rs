// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job Runner: spawns the playbook subprocess for one stage,
//! forwards its merged output to the store and the Event Bus, and reports
//! terminal status. Runs concurrently with its caller; the orchestrator
//! awaits [`JobRunner::run_stage`] per stage.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rke2_adapters::{CredentialStore, PlaybookProcess, Signal};
use rke2_core::{ChunkStream, CredentialId, JobId};
use rke2_storage::TopologyStore;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::secret::SecretFile;

const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("credential error: {0}")]
    Credential(#[from] rke2_adapters::CredentialError),

    #[error("playbook error: {0}")]
    Playbook(#[from] rke2_adapters::PlaybookError),

    #[error("store error: {0}")]
    Store(#[from] rke2_storage::StoreError),

    #[error("failed to write secret file: {0}")]
    SecretFile(#[from] std::io::Error),
}

pub struct JobRunner {
    store: Arc<TopologyStore>,
    credentials: Arc<dyn CredentialStore>,
    playbooks: Arc<dyn PlaybookProcess>,
    bus: Arc<crate::event_bus::EventBus>,
}

impl JobRunner {
    pub fn new(
        store: Arc<TopologyStore>,
        credentials: Arc<dyn CredentialStore>,
        playbooks: Arc<dyn PlaybookProcess>,
        bus: Arc<crate::event_bus::EventBus>,
    ) -> Self {
        Self { store, credentials, playbooks, bus }
    }

    /// Run one stage's playbook to completion (or cancellation). Decrypts
    /// the credential, writes the scoped secret file, spawns the
    /// subprocess, and forwards every output line to the store and bus
    /// until the process exits or `cancel_requested` is observed on the
    /// job record between lines.
    pub async fn run_stage(
        &self,
        job_id: JobId,
        playbook: &str,
        work_dir: &Path,
        credential_id: CredentialId,
    ) -> Result<StageOutcome, RunnerError> {
        let (login_user, secret, _kind) = self.credentials.fetch(credential_id).await?;
        let secret_file = SecretFile::write(work_dir, "id_rsa", &secret)?;
        info!(job_id = %job_id, login_user = %login_user, "decrypted credential into scoped secret file");

        let inventory_path = work_dir.join("inventory.ini");
        let extras_path = work_dir.join("extras.json");
        let mut handle =
            self.playbooks.spawn(playbook, &inventory_path, &extras_path, Some(secret_file.path())).await?;

        loop {
            if self.store.get_job(job_id).await.map(|j| j.cancel_requested).unwrap_or(false) {
                warn!(job_id = %job_id, "cancellation requested; sending termination signal");
                let _ = handle.signal(Signal::Term).await;
                if timeout(CANCEL_GRACE_PERIOD, handle.wait()).await.is_err() {
                    warn!(job_id = %job_id, "grace period elapsed; force-killing subprocess");
                    let _ = handle.signal(Signal::Kill).await;
                    let _ = handle.wait().await;
                }
                return Ok(StageOutcome::Cancelled);
            }

            match handle.next_line().await {
                Some((stream, line)) => self.forward_chunk(job_id, stream, line).await,
                None => break,
            }
        }

        let exit_code = handle.wait().await?;
        if exit_code == 0 {
            Ok(StageOutcome::Success)
        } else {
            self.forward_chunk(
                job_id,
                ChunkStream::Stderr,
                format!("playbook exited with non-zero status {exit_code}"),
            )
            .await;
            Ok(StageOutcome::Failed)
        }
        // `secret_file` is dropped (and unlinked) here regardless of which
        // branch above returned, satisfying "delete on every exit path."
    }

    async fn forward_chunk(&self, job_id: JobId, stream: ChunkStream, line: String) {
        match self.store.append_job_chunk(job_id, stream, line, Utc::now()).await {
            Ok(chunk) => self.bus.publish(chunk),
            Err(e) => warn!(job_id = %job_id, error = %e, "failed to persist output chunk"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rke2_adapters::fakes::{FakeCredentialStore, FakePlaybookProcess, ScriptedRun};
    use rke2_core::{ClusterBuilder, JobBuilder};
    use tempfile::tempdir;

    fn setup() -> (Arc<TopologyStore>, Arc<crate::event_bus::EventBus>) {
        (TopologyStore::in_memory(), Arc::new(crate::event_bus::EventBus::new()))
    }

    #[tokio::test]
    async fn successful_stage_reports_success_and_cleans_up_secret() {
        let (store, bus) = setup();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let job = store.insert_job(JobBuilder::default().cluster_id(cluster.id).build()).await.unwrap();

        let credentials = Arc::new(FakeCredentialStore::default());
        let playbooks =
            Arc::new(FakePlaybookProcess::new(vec![ScriptedRun::success(["PLAY [initial_master]", "ok"])]));
        let runner = JobRunner::new(store.clone(), credentials, playbooks, bus);

        let dir = tempdir().unwrap();
        let outcome =
            runner.run_stage(job.id, "initial_master.yml", dir.path(), CredentialId::new()).await.unwrap();
        assert_eq!(outcome, StageOutcome::Success);

        let job = store.get_job(job.id).await.unwrap();
        assert!(job.output.iter().any(|c| c.line.contains("PLAY")));
        assert!(!dir.path().join("id_rsa").exists());
    }

    #[tokio::test]
    async fn nonzero_exit_reports_failed_with_trailer_chunk() {
        let (store, bus) = setup();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let job = store.insert_job(JobBuilder::default().cluster_id(cluster.id).build()).await.unwrap();

        let credentials = Arc::new(FakeCredentialStore::default());
        let playbooks = Arc::new(FakePlaybookProcess::new(vec![ScriptedRun::failure(["fatal: unreachable"])]));
        let runner = JobRunner::new(store.clone(), credentials, playbooks, bus);

        let dir = tempdir().unwrap();
        let outcome = runner.run_stage(job.id, "workers.yml", dir.path(), CredentialId::new()).await.unwrap();
        assert_eq!(outcome, StageOutcome::Failed);

        let job = store.get_job(job.id).await.unwrap();
        assert!(job.output.iter().any(|c| c.line.contains("non-zero status 1")));
    }

    #[tokio::test]
    async fn cancel_requested_between_lines_terminates_and_returns_cancelled() {
        let (store, bus) = setup();
        let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
        let job = store
            .insert_job(JobBuilder::default().cluster_id(cluster.id).build())
            .await
            .unwrap();
        store.update_job(job.id, |j| j.cancel_requested = true).await.unwrap();

        let credentials = Arc::new(FakeCredentialStore::default());
        let playbooks = Arc::new(FakePlaybookProcess::new(vec![ScriptedRun::success(["should never be read"])]));
        let runner = JobRunner::new(store.clone(), credentials, playbooks, bus);

        let dir = tempdir().unwrap();
        let outcome = runner.run_stage(job.id, "workers.yml", dir.path(), CredentialId::new()).await.unwrap();
        assert_eq!(outcome, StageOutcome::Cancelled);
    }
}
