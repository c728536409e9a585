// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage tags used by the Inventory Renderer and the Stage Orchestrator.

/// A named phase of an operation, run against a filtered subset of nodes by
/// a single playbook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The single node with role `initial_master`.
    InitialMaster,
    /// Nodes with role `master` that are not the initial master.
    JoiningMasters,
    /// Nodes with role `worker`.
    Workers,
    /// All non-removed nodes, grouped masters/workers.
    All,
    /// An explicit node list classified into servers/agents groups.
    ScaleAdd,
    /// Drain-then-uninstall on an explicit target node list.
    Remove,
    /// Uninstall on all nodes.
    Uninstall,
    /// Read-only preflight/upgrade-check stage; no node transitions.
    ReadOnlyCheck,
}

crate::simple_display!(Stage {
    InitialMaster => "initial_master",
    JoiningMasters => "joining_masters",
    Workers => "workers",
    All => "all",
    ScaleAdd => "scale_add",
    Remove => "remove",
    Uninstall => "uninstall",
    ReadOnlyCheck => "read_only_check",
});
