// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guardrails: pure predicates evaluated after lock
//! acquisition, before any mutation or subprocess spawn. G2-G4 are pure
//! functions over an immutable [`TopologyState`] snapshot — no I/O, no
//! locking — so property test 5 (guardrail idempotence) holds by
//! construction. G1's best-effort TCP probe is the one guardrail with I/O,
//! injected via [`rke2_adapters::PortProbe`] so the others stay pure.

use std::time::Duration;

use rke2_adapters::PortProbe;
use rke2_core::{ClusterId, NodeRole, NodeStatus};
use rke2_storage::TopologyState;
use serde::{Deserialize, Serialize};

/// A node reference supplied by a caller adding nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub hostname: String,
    pub internal_address: String,
    pub external_address: Option<String>,
    pub use_external: bool,
    pub role: NodeRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailRejection {
    pub guardrail: &'static str,
    pub reason: String,
}

/// G2's removal is permitted with a non-fatal warning (even remaining
/// control-plane count) but never rejected for that reason alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardrailWarnings {
    pub warnings: Vec<String>,
}

/// G1: the cluster must have an `initial_master` with status `active`, and
/// a best-effort TCP probe of the control-plane join port should reach it.
/// Scale-add only.
pub async fn g1_bootstrap_prerequisite(
    state: &TopologyState,
    cluster_id: ClusterId,
    probe: &dyn PortProbe,
) -> Result<(), GuardrailRejection> {
    let initial = state
        .nodes_for_cluster(cluster_id)
        .find(|n| n.role == NodeRole::InitialMaster);

    let Some(initial) = initial else {
        return Err(GuardrailRejection {
            guardrail: "G1",
            reason: "cluster has no initial master node".to_string(),
        });
    };
    if initial.status != NodeStatus::Active {
        return Err(GuardrailRejection {
            guardrail: "G1",
            reason: format!("initial master '{}' is not active (status: {})", initial.hostname, initial.status),
        });
    }

    let cluster = state.clusters.get(&cluster_id);
    let port = cluster
        .and_then(|c| c.control_plane_endpoint.rsplit_once(':'))
        .and_then(|(_, port)| port.parse::<u16>().ok())
        .unwrap_or(9345);
    let reachable = probe.probe(initial.connect_address(), port, Duration::from_secs(3)).await;
    if !reachable {
        return Err(GuardrailRejection {
            guardrail: "G1",
            reason: format!("control-plane join port {port} on '{}' is not reachable", initial.hostname),
        });
    }
    Ok(())
}

/// G2: the set of remaining active control-plane nodes after the proposed
/// removal must be ≥ 1 and preserve consensus majority. Scale-remove only.
/// Removing any control-plane node requires `confirm = true`.
pub fn g2_safe_removal(
    state: &TopologyState,
    cluster_id: ClusterId,
    target_ids: &[rke2_core::NodeId],
    confirm: bool,
) -> Result<GuardrailWarnings, GuardrailRejection> {
    let active_control_plane: Vec<_> = state
        .nodes_for_cluster(cluster_id)
        .filter(|n| n.role.is_control_plane() && n.status == NodeStatus::Active)
        .collect();
    let total = active_control_plane.len();

    let removing_masters: Vec<_> =
        active_control_plane.iter().filter(|n| target_ids.contains(&n.id)).collect();

    if removing_masters.is_empty() {
        return Ok(GuardrailWarnings::default());
    }

    if !confirm {
        return Err(GuardrailRejection {
            guardrail: "G2",
            reason: "removing a control-plane node requires confirm_master_removal=true".to_string(),
        });
    }

    let remaining = total - removing_masters.len();
    let majority = total / 2 + 1;

    if remaining < 1 {
        return Err(GuardrailRejection {
            guardrail: "G2",
            reason: format!("removal would leave {remaining} control-plane nodes; at least 1 is required"),
        });
    }
    if remaining < majority {
        return Err(GuardrailRejection {
            guardrail: "G2",
            reason: format!(
                "removal would leave {remaining} of {total} control-plane nodes, below consensus majority ({majority})"
            ),
        });
    }

    let mut warnings = GuardrailWarnings::default();
    if remaining % 2 == 0 {
        warnings.warnings.push(format!(
            "{remaining} remaining control-plane nodes is an even count; consider an odd number for tie-breaking"
        ));
    }
    Ok(warnings)
}

/// G3: if the scale-add request mixes control-plane and worker nodes, only
/// the control-plane job is created. Scale-add only.
pub fn g3_split_roles(specs: &[NodeSpec]) -> (Vec<NodeSpec>, Vec<NodeSpec>) {
    let masters: Vec<_> = specs.iter().filter(|s| s.role.is_control_plane()).cloned().collect();
    let workers: Vec<_> = specs.iter().filter(|s| s.role == NodeRole::Worker).cloned().collect();
    (masters, workers)
}

/// G4: no duplicate hostname or address (internal or external) against any
/// non-removed node already in the cluster. Scale-add only.
pub fn g4_node_identity(
    state: &TopologyState,
    cluster_id: ClusterId,
    specs: &[NodeSpec],
) -> Result<(), GuardrailRejection> {
    let existing: Vec<_> = state.nodes_for_cluster(cluster_id).filter(|n| n.status.is_present()).collect();

    for spec in specs {
        for node in &existing {
            if node.hostname == spec.hostname {
                return Err(GuardrailRejection {
                    guardrail: "G4",
                    reason: format!("duplicate hostname '{}'", spec.hostname),
                });
            }
            let clash = node.internal_address == spec.internal_address
                || spec.external_address.as_deref().is_some_and(|ext| {
                    node.internal_address == ext || node.external_address.as_deref() == Some(ext)
                })
                || node.external_address.as_deref() == Some(spec.internal_address.as_str());
            if clash {
                return Err(GuardrailRejection {
                    guardrail: "G4",
                    reason: format!("duplicate address '{}'", spec.internal_address),
                });
            }
        }
        // Also check within the batch itself.
        for other in specs {
            if std::ptr::eq(spec, other) {
                continue;
            }
            if spec.hostname == other.hostname || spec.internal_address == other.internal_address {
                return Err(GuardrailRejection {
                    guardrail: "G4",
                    reason: format!("duplicate hostname or address within request: '{}'", spec.hostname),
                });
            }
        }
    }
    Ok(())
}
