// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node: a single control-plane or worker host within a cluster.

use crate::id::{ClusterId, NodeId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A node's role in the RKE2 cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Bootstraps consensus. Exactly one per cluster once any node is active.
    InitialMaster,
    /// Additional control-plane node; joins via the initial master's endpoint.
    Master,
    /// Agent-only node.
    Worker,
}

crate::simple_display!(NodeRole {
    InitialMaster => "initial_master",
    Master => "master",
    Worker => "worker",
});

impl NodeRole {
    pub fn is_control_plane(self) -> bool {
        matches!(self, NodeRole::InitialMaster | NodeRole::Master)
    }
}

/// A node's lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Installing,
    Active,
    Failed,
    Draining,
    Removed,
}

crate::simple_display!(NodeStatus {
    Pending => "pending",
    Installing => "installing",
    Active => "active",
    Failed => "failed",
    Draining => "draining",
    Removed => "removed",
});

impl NodeStatus {
    /// Returns true for any status other than `removed`.
    pub fn is_present(self) -> bool {
        !matches!(self, NodeStatus::Removed)
    }
}

/// Error returned by [`Node::transition`] when the requested status change
/// does not follow one of the two monotonic sequences:
/// `pending -> installing -> {active, failed}` (install) or
/// `active -> draining -> {removed, failed}` (remove).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("illegal node transition {from} -> {to} for node {node_id}")]
pub struct IllegalTransition {
    pub node_id: NodeId,
    pub from: NodeStatus,
    pub to: NodeStatus,
}

/// A single control-plane or worker host within a cluster.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub cluster_id: ClusterId,
    pub hostname: String,
    pub internal_address: String,
    pub external_address: Option<String>,
    /// Which address the playbook runner connects to.
    pub use_external: bool,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub install_started_at: Option<DateTime<Utc>>,
    pub install_ended_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub variables: HashMap<String, String>,
}

impl Node {
    /// The address the playbook runner should connect to for this node.
    pub fn connect_address(&self) -> &str {
        if self.use_external {
            self.external_address.as_deref().unwrap_or(&self.internal_address)
        } else {
            &self.internal_address
        }
    }

    /// Attempt a status transition, enforcing the monotonic sequences from
    /// the data model invariants. Cross-operation transitions back to
    /// `pending` on the same row are always rejected.
    pub fn transition(&mut self, to: NodeStatus) -> Result<(), IllegalTransition> {
        let from = self.status;
        let allowed = matches!(
            (from, to),
            (NodeStatus::Pending, NodeStatus::Installing)
                | (NodeStatus::Installing, NodeStatus::Active)
                | (NodeStatus::Installing, NodeStatus::Failed)
                | (NodeStatus::Active, NodeStatus::Draining)
                | (NodeStatus::Draining, NodeStatus::Removed)
                | (NodeStatus::Draining, NodeStatus::Failed)
                // Idempotent re-application of the same terminal status, e.g.
                // a retried reconciliation pass observing an already-failed node.
                | (a, b) if a == b
        );
        if !allowed {
            return Err(IllegalTransition { node_id: self.id, from, to });
        }
        self.status = to;
        Ok(())
    }
}

crate::builder! {
    pub struct NodeBuilder => Node {
        into {
            hostname: String = "node",
            internal_address: String = "10.0.0.1",
        }
        set {
            cluster_id: ClusterId = ClusterId::new(),
            use_external: bool = false,
            role: NodeRole = NodeRole::Worker,
            status: NodeStatus = NodeStatus::Pending,
        }
        option {
            external_address: String = None,
            last_error: String = None,
        }
        computed {
            id: NodeId = NodeId::new(),
            install_started_at: Option<DateTime<Utc>> = None,
            install_ended_at: Option<DateTime<Utc>> = None,
            variables: HashMap<String, String> = HashMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
