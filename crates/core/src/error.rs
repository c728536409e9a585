// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The API-boundary error taxonomy. Every error surfaced by
//! `rke2_engine::JobApi` is one of these variants; `rke2-daemon` maps each
//! to an HTTP status code and `{detail}` body with no further business
//! logic of its own.

use crate::id::{ClusterId, CredentialId, JobId, NodeId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The cluster's lock is already held by a running job.
    #[error("cluster is busy with operation '{operation_name}' (job {current_job}); please wait for it to complete")]
    Conflict { cluster_id: ClusterId, operation_name: String, current_job: JobId },

    /// Malformed input, a missing confirmation, or an unknown reference
    /// supplied by the caller.
    #[error("validation error: {detail}")]
    ValidationError { detail: String },

    /// A guardrail (G1-G4) rejected the request before any mutation.
    #[error("guardrail rejection ({guardrail}): {reason}")]
    GuardrailRejection { guardrail: &'static str, reason: String },

    /// An unknown cluster, node, job, or credential id.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The job reached a terminal non-success status. Surfaced via
    /// `GET /jobs/{id}`, never as an HTTP error on the call that started
    /// the job (that call only returns the job id).
    #[error("job {job_id} failed: {reason}")]
    JobFailure { job_id: JobId, reason: String },

    /// The runner could not spawn or supervise the playbook subprocess.
    /// Converted to `JobFailure` on the job record, kept distinct here so
    /// callers synchronously invoking a job (e.g. tests) can tell the two
    /// apart before the job is persisted.
    #[error("runner error: {0}")]
    RunnerError(String),

    /// A Topology Store I/O or serialization failure. Must never corrupt
    /// lock state: the store's acquire/release paths are transactional
    /// with respect to this error.
    #[error("store error: {0}")]
    StoreError(String),
}

impl ApiError {
    pub fn not_found_cluster(id: ClusterId) -> Self {
        Self::NotFound { kind: "cluster", id: id.to_string() }
    }

    pub fn not_found_node(id: NodeId) -> Self {
        Self::NotFound { kind: "node", id: id.to_string() }
    }

    pub fn not_found_job(id: JobId) -> Self {
        Self::NotFound { kind: "job", id: id.to_string() }
    }

    pub fn not_found_credential(id: CredentialId) -> Self {
        Self::NotFound { kind: "credential", id: id.to_string() }
    }

    /// Machine-readable error kind (`conflict`, `validation_error`, ...),
    /// used for the HTTP response body's `error` field and for log
    /// filtering.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Conflict { .. } => "conflict",
            ApiError::ValidationError { .. } => "validation_error",
            ApiError::GuardrailRejection { .. } => "guardrail_rejection",
            ApiError::NotFound { .. } => "not_found",
            ApiError::JobFailure { .. } => "job_failure",
            ApiError::RunnerError(_) => "runner_error",
            ApiError::StoreError(_) => "store_error",
        }
    }
}
