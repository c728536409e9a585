// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Topology Store's error taxonomy. `rke2-engine` converts every
//! variant here into `ApiError::StoreError` at the seam:
//! adapter/store-specific error types never leak past the engine boundary.

use rke2_core::{ClusterId, CredentialId, JobId, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error persisting topology snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize topology snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cluster '{0}' not found")]
    ClusterNotFound(ClusterId),

    #[error("node '{0}' not found")]
    NodeNotFound(NodeId),

    #[error("job '{0}' not found")]
    JobNotFound(JobId),

    #[error("credential '{0}' not found")]
    CredentialNotFound(CredentialId),

    #[error("a cluster named '{0}' already exists")]
    DuplicateClusterName(String),

    #[error("hostname '{hostname}' already in use on cluster '{cluster_id}'")]
    DuplicateHostname { cluster_id: ClusterId, hostname: String },

    #[error("address '{address}' already in use on cluster '{cluster_id}'")]
    DuplicateAddress { cluster_id: ClusterId, address: String },

    #[error("cluster '{0}' is already locked")]
    AlreadyLocked(ClusterId),

    #[error("cluster '{0}' lock is not held")]
    NotLocked(ClusterId),
}
