// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inventory Renderer: transforms a filtered view of the
//! topology into an inventory document and an extra-variables document for
//! a named stage, written to a short-lived per-job working directory.

use std::path::{Path, PathBuf};

use rke2_core::{Cluster, Node, NodeRole, NodeStatus, Stage};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Explicit node list for the `scale_add` stage; every server in the list
/// is treated as joining (never initial).
#[derive(Debug, Clone, Default)]
pub struct ScaleAddTargets {
    pub servers: Vec<Node>,
    pub agents: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct RenderedInventory {
    pub document: String,
    pub extras: Value,
}

/// Strict stage filtering. `scale_add_targets` is only
/// consulted for `Stage::ScaleAdd`; `explicit_nodes` is consulted for
/// `Stage::Remove` (drain/uninstall target list).
pub fn render(
    cluster: &Cluster,
    stage: Stage,
    all_nodes: &[Node],
    scale_add_targets: Option<&ScaleAddTargets>,
    explicit_nodes: Option<&[Node]>,
) -> RenderedInventory {
    let (masters, workers) = match stage {
        Stage::InitialMaster => {
            let initial = all_nodes
                .iter()
                .find(|n| n.role == NodeRole::InitialMaster && n.status.is_present())
                .cloned();
            (initial.into_iter().collect(), Vec::new())
        }
        Stage::JoiningMasters => (
            all_nodes
                .iter()
                .filter(|n| n.role == NodeRole::Master && n.status.is_present())
                .cloned()
                .collect(),
            Vec::new(),
        ),
        Stage::Workers => (
            Vec::new(),
            all_nodes.iter().filter(|n| n.role == NodeRole::Worker && n.status.is_present()).cloned().collect(),
        ),
        Stage::All => (
            all_nodes.iter().filter(|n| n.role.is_control_plane() && n.status.is_present()).cloned().collect(),
            all_nodes.iter().filter(|n| n.role == NodeRole::Worker && n.status.is_present()).cloned().collect(),
        ),
        Stage::ScaleAdd => {
            let targets = scale_add_targets.cloned().unwrap_or_default();
            (targets.servers, targets.agents)
        }
        Stage::Remove | Stage::Uninstall => {
            let targets = explicit_nodes.map(|n| n.to_vec()).unwrap_or_else(|| all_nodes.to_vec());
            let (m, w): (Vec<_>, Vec<_>) = targets.into_iter().partition(|n| n.role.is_control_plane());
            (m, w)
        }
        Stage::ReadOnlyCheck => (
            all_nodes.iter().filter(|n| n.role.is_control_plane() && n.status.is_present()).cloned().collect(),
            all_nodes.iter().filter(|n| n.role == NodeRole::Worker && n.status.is_present()).cloned().collect(),
        ),
    };

    let document = render_document(&masters, &workers);
    // `joining` is true for every stage except the initial-master bootstrap:
    // the renderer guarantees the initial-master variant has no
    // server-endpoint field and joining variants always have it.
    let joining = stage != Stage::InitialMaster;
    let extras = render_extras(cluster, joining);

    info!(
        stage = %stage,
        masters = masters.len(),
        workers = workers.len(),
        "rendered inventory"
    );
    debug!(extras = %redacted_extras(&extras), "rendered extra-variables document");

    RenderedInventory { document, extras }
}

fn render_document(masters: &[Node], workers: &[Node]) -> String {
    let mut doc = String::new();
    doc.push_str("[masters]\n");
    for node in masters {
        doc.push_str(&host_line(node));
    }
    doc.push_str("\n[workers]\n");
    for node in workers {
        doc.push_str(&host_line(node));
    }
    doc
}

fn host_line(node: &Node) -> String {
    format!(
        "{} ansible_host={} ansible_user=rke2 rke2_role={}\n",
        node.hostname,
        node.connect_address(),
        node.role
    )
}

fn render_extras(cluster: &Cluster, joining: bool) -> Value {
    let mut extras = json!({
        "rke2_version": cluster.target_version,
        "rke2_data_dir": "/var/lib/rancher/rke2",
        "rke2_api_endpoint": cluster.control_plane_endpoint,
        "rke2_token": cluster.bootstrap_token,
        "rke2_cni": cluster.network_plugin.to_string(),
    });
    if joining {
        extras["rke2_server_url"] = json!(format!("https://{}", cluster.control_plane_endpoint));
    }
    if let Some(registry) = &cluster.registry {
        extras["rke2_registry_mirror"] = json!(registry.mirror_url);
        extras["rke2_registry_insecure"] = json!(registry.insecure);
    }
    if let Some(overrides) = &cluster.image_overrides {
        if let Some(pause) = &overrides.pause_image {
            extras["rke2_pause_image"] = json!(pause);
        }
        if let Some(etcd) = &overrides.etcd_image {
            extras["rke2_etcd_image"] = json!(etcd);
        }
    }
    extras
}

/// A copy of the extras document with the bootstrap token redacted, for
/// the full-document debug log line: never logs the rendered extras
/// document verbatim.
fn redacted_extras(extras: &Value) -> Value {
    let mut copy = extras.clone();
    if copy.get("rke2_token").is_some() {
        copy["rke2_token"] = json!("***");
    }
    copy
}

/// Writes the rendered inventory/extras pair to disk in `dir`, returning
/// the paths. `dir` is the job's disposable working directory.
pub fn write_to_dir(dir: &Path, rendered: &RenderedInventory) -> std::io::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let inventory_path = dir.join("inventory.ini");
    let extras_path = dir.join("extras.json");
    std::fs::write(&inventory_path, &rendered.document)?;
    std::fs::write(&extras_path, serde_json::to_vec_pretty(&rendered.extras)?)?;
    Ok((inventory_path, extras_path))
}
