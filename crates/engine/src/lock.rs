// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster Lock Manager: exclusive, non-reentrant, per
//! cluster acquisition that fails fast. [`LockGuard`] is the only way
//! calling code can hold an acquired lock: its `Drop` impl schedules the
//! release on every exit path, including a panicking stage or an early
//! `?`-return, so a stuck lock cannot leak from normal control flow.

use std::sync::Arc;

use chrono::Utc;
use rke2_core::{ClusterId, JobId};
use rke2_storage::{StoreError, TopologyStore};
use tracing::{info, warn};

pub struct LockManager {
    store: Arc<TopologyStore>,
}

impl LockManager {
    pub fn new(store: Arc<TopologyStore>) -> Self {
        Self { store }
    }

    /// Attempts to acquire the cluster's lock. Fails fast with the current
    /// holder's operation name and job id on conflict —
    /// never blocks waiting for the lock to free up.
    pub async fn acquire(
        &self,
        cluster_id: ClusterId,
        job_id: JobId,
        operation_name: impl Into<String>,
    ) -> Result<LockGuard, LockConflict> {
        let operation_name = operation_name.into();
        match self.store.acquire_lock(cluster_id, job_id, operation_name.clone(), Utc::now()).await {
            Ok(()) => {
                info!(cluster_id = %cluster_id, job_id = %job_id, operation = %operation_name, "acquired cluster lock");
                Ok(LockGuard { store: self.store.clone(), cluster_id, released: false })
            }
            Err(StoreError::AlreadyLocked(_)) => {
                let cluster = self.store.get_cluster(cluster_id).await.map_err(LockConflict::Store)?;
                Err(LockConflict::Busy {
                    cluster_id,
                    operation_name: cluster.lock.operation_name.unwrap_or_default(),
                    current_job: cluster.lock.current_job.unwrap_or_else(JobId::new),
                })
            }
            Err(other) => Err(LockConflict::Store(other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockConflict {
    #[error("cluster is busy with operation '{operation_name}' (job {current_job}); please wait for it to complete")]
    Busy { cluster_id: ClusterId, operation_name: String, current_job: JobId },

    #[error("store error while acquiring lock: {0}")]
    Store(#[from] StoreError),
}

/// RAII guard representing an acquired cluster lock. Release is explicit
/// via [`LockGuard::release`] on the success path (so callers can await
/// it); if dropped without an explicit release (panic, early return), the
/// guard detaches a release task so the lock is never left stuck.
pub struct LockGuard {
    store: Arc<TopologyStore>,
    cluster_id: ClusterId,
    released: bool,
}

impl LockGuard {
    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    /// Explicitly release the lock and await the result. Idempotent:
    /// releasing an already-idle lock is a no-op success.
    pub async fn release(mut self) -> Result<(), StoreError> {
        self.released = true;
        self.store.release_lock(self.cluster_id).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let cluster_id = self.cluster_id;
        // `Drop` cannot `.await`; detach a release task. This is the path
        // exercised by a panicking stage or an early `?`-return during
        // orchestration that skips the explicit `release().await` call.
        tokio::spawn(async move {
            match store.release_lock(cluster_id).await {
                Ok(()) => warn!(cluster_id = %cluster_id, "released cluster lock via guard drop (not an explicit release)"),
                Err(e) => warn!(cluster_id = %cluster_id, error = %e, "failed to release cluster lock on guard drop"),
            }
        });
    }
}
