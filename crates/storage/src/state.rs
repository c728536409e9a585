// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory topology state: the materialized record of every cluster,
//! node, job, and credential. Unlike the corpus's WAL/event-sourced
//! `MaterializedState`, this is mutated directly and snapshotted whole on
//! every commit (§4.1's scope reduction, recorded in DESIGN.md) — topology
//! mutation volume is low compared to byte-level job output, so replay
//! machinery buys nothing here.

use std::collections::HashMap;

use rke2_core::{Cluster, ClusterId, Credential, CredentialId, Job, JobId, Node, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TopologyState {
    pub clusters: HashMap<ClusterId, Cluster>,
    pub nodes: HashMap<NodeId, Node>,
    pub jobs: HashMap<JobId, Job>,
    pub credentials: HashMap<CredentialId, Credential>,
}

impl TopologyState {
    pub fn nodes_for_cluster(&self, cluster_id: ClusterId) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.cluster_id == cluster_id)
    }

    pub fn jobs_for_cluster(&self, cluster_id: ClusterId) -> impl Iterator<Item = &Job> {
        self.jobs.values().filter(move |j| j.cluster_id == cluster_id)
    }

    /// `(cluster_id, hostname)` and `(cluster_id, any_ip)` must be unique
    /// across non-removed nodes.
    pub fn check_node_identity_unique(
        &self,
        cluster_id: ClusterId,
        hostname: &str,
        internal_address: &str,
        external_address: Option<&str>,
        excluding: Option<NodeId>,
    ) -> Result<(), StoreError> {
        for node in self.nodes_for_cluster(cluster_id) {
            if Some(node.id) == excluding || !node.status.is_present() {
                continue;
            }
            if node.hostname == hostname {
                return Err(StoreError::DuplicateHostname {
                    cluster_id,
                    hostname: hostname.to_string(),
                });
            }
            let addrs_clash = node.internal_address == internal_address
                || (node.external_address.as_deref() == Some(internal_address) && !internal_address.is_empty())
                || external_address.is_some_and(|ext| {
                    node.internal_address == ext || node.external_address.as_deref() == Some(ext)
                });
            if addrs_clash {
                return Err(StoreError::DuplicateAddress {
                    cluster_id,
                    address: internal_address.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn find_cluster_by_name(&self, name: &str) -> Option<&Cluster> {
        self.clusters.values().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rke2_core::{NodeBuilder, NodeStatus};

    #[test]
    fn node_identity_rejects_duplicate_hostname() {
        let mut state = TopologyState::default();
        let cluster_id = ClusterId::new();
        let existing = NodeBuilder::default()
            .cluster_id(cluster_id)
            .hostname("node-a")
            .internal_address("10.0.0.5")
            .build();
        state.nodes.insert(existing.id, existing);

        let err = state
            .check_node_identity_unique(cluster_id, "node-a", "10.0.0.6", None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHostname { .. }));
    }

    #[test]
    fn node_identity_ignores_removed_nodes() {
        let mut state = TopologyState::default();
        let cluster_id = ClusterId::new();
        let removed = NodeBuilder::default()
            .cluster_id(cluster_id)
            .hostname("node-a")
            .internal_address("10.0.0.5")
            .status(NodeStatus::Removed)
            .build();
        state.nodes.insert(removed.id, removed);

        assert!(state
            .check_node_identity_unique(cluster_id, "node-a", "10.0.0.5", None, None)
            .is_ok());
    }

    #[test]
    fn node_identity_allows_self_when_excluded() {
        let mut state = TopologyState::default();
        let cluster_id = ClusterId::new();
        let node = NodeBuilder::default()
            .cluster_id(cluster_id)
            .hostname("node-a")
            .internal_address("10.0.0.5")
            .build();
        let id = node.id;
        state.nodes.insert(id, node);

        assert!(state
            .check_node_identity_unique(cluster_id, "node-a", "10.0.0.5", None, Some(id))
            .is_ok());
    }
}
