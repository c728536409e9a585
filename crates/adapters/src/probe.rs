// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `KubeStatusProbe`: a `kube`/`k8s-openapi`-based cluster-status probe
//!. Used by the UI, not by the orchestrator's correctness
//! path — failures are non-fatal and returned as a best-effort document.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node as K8sNode;
use kube::{Api, Client, Config};
use rke2_core::Cluster;
use serde_json::json;

use crate::error::ProbeError;
use crate::traits::ClusterStatusProbe;

/// Builds a `kube::Client` against a cluster's control-plane endpoint and
/// lists node readiness. Kubeconfig/bearer token acquisition is out of
/// scope here; this probe expects a usable `kube::Config` to already be
/// resolvable for the cluster's endpoint.
#[derive(Debug, Clone, Default)]
pub struct KubeStatusProbe;

#[async_trait]
impl ClusterStatusProbe for KubeStatusProbe {
    async fn status(&self, cluster: &Cluster) -> Result<serde_json::Value, ProbeError> {
        let mut config = Config::infer().await.map_err(|e| ProbeError::Client(e.to_string()))?;
        config.cluster_url = format!("https://{}", cluster.control_plane_endpoint)
            .parse()
            .map_err(|e| ProbeError::Client(format!("invalid control-plane endpoint: {e}")))?;
        let client = Client::try_from(config).map_err(|e| ProbeError::Client(e.to_string()))?;

        let nodes: Api<K8sNode> = Api::all(client);
        let list = nodes.list(&Default::default()).await.map_err(|e| ProbeError::Query(e.to_string()))?;

        let node_statuses: Vec<_> = list
            .items
            .iter()
            .map(|n| {
                let name = n.metadata.name.clone().unwrap_or_default();
                let ready = n
                    .status
                    .as_ref()
                    .and_then(|s| s.conditions.as_ref())
                    .and_then(|conds| conds.iter().find(|c| c.type_ == "Ready"))
                    .map(|c| c.status == "True")
                    .unwrap_or(false);
                json!({ "name": name, "ready": ready })
            })
            .collect();

        Ok(json!({ "cluster_id": cluster.id.to_string(), "nodes": node_statuses }))
    }
}
