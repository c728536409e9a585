// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster: the top-level topology record and its per-cluster lock.

use crate::id::{ClusterId, CredentialId, JobId};
use chrono::{DateTime, Utc};

/// Whether a cluster was bootstrapped by this orchestrator or adopted from
/// an existing, already-running RKE2 deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
    Fresh,
    Registered,
}

crate::simple_display!(ClusterKind {
    Fresh => "fresh",
    Registered => "registered",
});

/// Network plugin selection rendered into the extra-variables document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPlugin {
    Canal,
    Calico,
    Cilium,
}

crate::simple_display!(NetworkPlugin {
    Canal => "canal",
    Calico => "calico",
    Cilium => "cilium",
});

/// Whether a cluster currently has a mutating operation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Idle,
    Running,
}

crate::simple_display!(LockStatus {
    Idle => "idle",
    Running => "running",
});

/// The per-cluster exclusive operation record enforcing single-writer
/// semantics. Acquire and release always set every field in one commit.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LockRecord {
    pub status: LockStatus,
    pub current_job: Option<JobId>,
    pub operation_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl LockRecord {
    pub fn idle() -> Self {
        Self { status: LockStatus::Idle, current_job: None, operation_name: None, started_at: None }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.status, LockStatus::Idle)
    }
}

impl Default for LockRecord {
    fn default() -> Self {
        Self::idle()
    }
}

/// Optional registry mirror/pull-through settings rendered into extras.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct RegistrySettings {
    pub mirror_url: String,
    pub insecure: bool,
}

/// Per-image version override, rendered into extras when present.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ImageOverrides {
    pub pause_image: Option<String>,
    pub etcd_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub kind: ClusterKind,
    pub target_version: String,
    pub network_plugin: NetworkPlugin,
    pub control_plane_endpoint: String,
    pub bootstrap_token: String,
    /// The SSH credential used to connect to every node in this cluster.
    /// The Job Runner requires a credential id per stage; this is the
    /// owning entity (see DESIGN.md).
    pub credential_id: CredentialId,
    pub san_list: Option<Vec<String>>,
    pub registry: Option<RegistrySettings>,
    pub image_overrides: Option<ImageOverrides>,
    pub config_document: Option<String>,
    pub lock: LockRecord,
    /// The stage the orchestrator is currently executing, so an external
    /// observer can see phase without reading the job's log.
    pub current_stage: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

crate::builder! {
    pub struct ClusterBuilder => Cluster {
        into {
            name: String = "cluster",
            target_version: String = "v1.30.4+rke2r1",
            control_plane_endpoint: String = "10.0.0.1:9345",
            bootstrap_token: String = "test-token",
        }
        set {
            kind: ClusterKind = ClusterKind::Fresh,
            network_plugin: NetworkPlugin = NetworkPlugin::Canal,
            lock: LockRecord = LockRecord::idle(),
            credential_id: CredentialId = CredentialId::new(),
        }
        option {
            config_document: String = None,
            current_stage: String = None,
        }
        computed {
            id: ClusterId = ClusterId::new(),
            san_list: Option<Vec<String>> = None,
            registry: Option<RegistrySettings> = None,
            image_overrides: Option<ImageOverrides> = None,
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod tests;
