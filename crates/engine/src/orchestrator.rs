// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage Orchestrator: given a validated, locked request,
//! computes the stage sequence for a job kind, invokes the Job Runner per
//! stage in strict order, and transitions participating node statuses.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rke2_core::{
    Cluster, ClusterId, CredentialId, JobId, JobKind, JobStatus, Node, NodeId, NodeRole, NodeStatus, ReadinessResult,
    Stage,
};
use rke2_storage::{StoreError, TopologyStore};
use tracing::{info, warn, Instrument};

use crate::inventory::{self, ScaleAddTargets};
use crate::runner::{JobRunner, RunnerError, StageOutcome};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("failed to render or write inventory: {0}")]
    Inventory(#[from] std::io::Error),
}

/// One stage of an orchestration plan: which inventory tag to render,
/// which playbook to run, and which node ids participate.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub stage: Stage,
    pub playbook: String,
    pub participating_node_ids: Vec<NodeId>,
}

/// Computes the stage sequence for a job kind. `all_nodes`
/// is the cluster's full node list (used for `install`'s role-based
/// filtering); `target_node_ids` is the explicit set for scale/remove
/// operations ("new nodes only" / the removal targets).
pub fn plan_stages(kind: JobKind, all_nodes: &[Node], target_node_ids: &[NodeId]) -> Vec<StagePlan> {
    match kind {
        JobKind::Install => {
            let mut stages = Vec::new();
            let initial: Vec<NodeId> = all_nodes
                .iter()
                .filter(|n| n.role == NodeRole::InitialMaster && n.status.is_present())
                .map(|n| n.id)
                .collect();
            if !initial.is_empty() {
                stages.push(StagePlan {
                    stage: Stage::InitialMaster,
                    playbook: "initial_master.yml".to_string(),
                    participating_node_ids: initial,
                });
            }
            let masters: Vec<NodeId> =
                all_nodes.iter().filter(|n| n.role == NodeRole::Master && n.status.is_present()).map(|n| n.id).collect();
            if !masters.is_empty() {
                stages.push(StagePlan {
                    stage: Stage::JoiningMasters,
                    playbook: "joining_masters.yml".to_string(),
                    participating_node_ids: masters,
                });
            }
            let workers: Vec<NodeId> =
                all_nodes.iter().filter(|n| n.role == NodeRole::Worker && n.status.is_present()).map(|n| n.id).collect();
            if !workers.is_empty() {
                stages.push(StagePlan {
                    stage: Stage::Workers,
                    playbook: "workers.yml".to_string(),
                    participating_node_ids: workers,
                });
            }
            stages
        }
        JobKind::ScaleAddMasters | JobKind::ScaleAddWorkers => vec![StagePlan {
            stage: Stage::ScaleAdd,
            playbook: "scale_add.yml".to_string(),
            participating_node_ids: target_node_ids.to_vec(),
        }],
        JobKind::ScaleRemove => vec![StagePlan {
            stage: Stage::Remove,
            playbook: "remove.yml".to_string(),
            participating_node_ids: target_node_ids.to_vec(),
        }],
        JobKind::Uninstall => {
            let ids: Vec<NodeId> = all_nodes.iter().filter(|n| n.status.is_present()).map(|n| n.id).collect();
            vec![StagePlan { stage: Stage::Uninstall, playbook: "uninstall.yml".to_string(), participating_node_ids: ids }]
        }
        JobKind::PreflightCheck => vec![StagePlan {
            stage: Stage::ReadOnlyCheck,
            playbook: "preflight_check.yml".to_string(),
            participating_node_ids: all_nodes.iter().filter(|n| n.status.is_present()).map(|n| n.id).collect(),
        }],
        JobKind::UpgradeCheck => vec![StagePlan {
            stage: Stage::ReadOnlyCheck,
            playbook: "upgrade_check.yml".to_string(),
            participating_node_ids: all_nodes.iter().filter(|n| n.status.is_present()).map(|n| n.id).collect(),
        }],
    }
}

/// Builds the structured [`ReadinessResult`] for a preflight/upgrade-check
/// job from its persisted output, recognizing the line convention the
/// readiness playbooks emit: `CHECK_PASS: <name>`, `CHECK_FAIL: <name>`,
/// `CHECK_WARN: <message>`. Lines outside that convention are ordinary
/// playbook chatter and contribute nothing to the structured result — the
/// raw lines remain available via the job's output buffer regardless.
fn parse_readiness(output: &[rke2_core::OutputChunk]) -> ReadinessResult {
    let mut result = ReadinessResult::default();
    for chunk in output {
        if let Some(name) = chunk.line.strip_prefix("CHECK_PASS:") {
            result.checks_passed.push(name.trim().to_string());
        } else if let Some(name) = chunk.line.strip_prefix("CHECK_FAIL:") {
            result.checks_failed.push(name.trim().to_string());
        } else if let Some(message) = chunk.line.strip_prefix("CHECK_WARN:") {
            result.warnings.push(message.trim().to_string());
        }
    }
    result
}

pub struct StageOrchestrator {
    store: Arc<TopologyStore>,
    runner: Arc<JobRunner>,
    work_dir_root: PathBuf,
}

impl StageOrchestrator {
    pub fn new(store: Arc<TopologyStore>, runner: Arc<JobRunner>, work_dir_root: PathBuf) -> Self {
        Self { store, runner, work_dir_root }
    }

    /// Run every planned stage in strict sequence. Stops at the first
    /// non-success outcome, transitioning that stage's nodes to `failed`
    /// and never starting the remaining stages. Marks the
    /// job's terminal status and returns.
    pub async fn run(
        &self,
        job_id: JobId,
        cluster_id: ClusterId,
        credential_id: CredentialId,
        stages: Vec<StagePlan>,
    ) -> Result<(), OrchestratorError> {
        self.store
            .update_job(job_id, |j| {
                j.status = JobStatus::Running;
                j.started_at = Some(Utc::now());
            })
            .await?;

        let mut final_status = JobStatus::Success;
        let is_read_only_check = stages.iter().any(|p| p.stage == Stage::ReadOnlyCheck);

        for plan in stages {
            let stage = plan.stage;
            let outcome = self
                .run_one_stage(job_id, cluster_id, credential_id, &plan)
                .instrument(tracing::info_span!("stage", stage = %stage, job_id = %job_id, cluster_id = %cluster_id))
                .await?;

            match outcome {
                StageOutcome::Success => continue,
                StageOutcome::Failed => {
                    final_status = JobStatus::Failed;
                    break;
                }
                StageOutcome::Cancelled => {
                    final_status = JobStatus::Cancelled;
                    break;
                }
            }
        }

        if is_read_only_check && final_status == JobStatus::Success {
            let job = self.store.get_job(job_id).await?;
            let readiness = parse_readiness(&job.output);
            self.store.update_job(job_id, |j| j.readiness_result = Some(readiness)).await?;
        }

        self.store
            .update_job(job_id, |j| {
                j.status = final_status;
                j.completed_at = Some(Utc::now());
            })
            .await?;
        Ok(())
    }

    async fn run_one_stage(
        &self,
        job_id: JobId,
        cluster_id: ClusterId,
        credential_id: CredentialId,
        plan: &StagePlan,
    ) -> Result<StageOutcome, OrchestratorError> {
        let cluster = self.store.get_cluster(cluster_id).await?;
        let all_nodes = self.store.list_nodes(cluster_id).await;
        let removing = matches!(plan.stage, Stage::Remove | Stage::Uninstall);

        self.store.update_cluster(cluster_id, |c| c.current_stage = Some(plan.stage.to_string())).await?;
        self.transition_nodes(&plan.participating_node_ids, if removing { NodeStatus::Draining } else { NodeStatus::Installing }).await?;

        let rendered = self.render_for_stage(&cluster, plan, &all_nodes)?;
        let work_dir = self.work_dir_root.join(job_id.to_string());
        let (_inventory_path, _extras_path) = inventory::write_to_dir(&work_dir, &rendered)?;

        info!(job_id = %job_id, stage = %plan.stage, playbook = %plan.playbook, "starting stage");
        let outcome = self.runner.run_stage(job_id, &plan.playbook, &work_dir, credential_id).await?;

        match outcome {
            StageOutcome::Success => {
                let done_status = if removing { NodeStatus::Removed } else { NodeStatus::Active };
                self.transition_nodes(&plan.participating_node_ids, done_status).await?;
            }
            StageOutcome::Failed | StageOutcome::Cancelled => {
                self.transition_nodes(&plan.participating_node_ids, NodeStatus::Failed).await?;
            }
        }

        let _ = std::fs::remove_dir_all(&work_dir);
        Ok(outcome)
    }

    fn render_for_stage(
        &self,
        cluster: &Cluster,
        plan: &StagePlan,
        all_nodes: &[Node],
    ) -> Result<inventory::RenderedInventory, OrchestratorError> {
        let participating: Vec<Node> =
            all_nodes.iter().filter(|n| plan.participating_node_ids.contains(&n.id)).cloned().collect();

        let rendered = match plan.stage {
            Stage::ScaleAdd => {
                let (servers, agents): (Vec<Node>, Vec<Node>) =
                    participating.into_iter().partition(|n| n.role.is_control_plane());
                let targets = ScaleAddTargets { servers, agents };
                inventory::render(cluster, plan.stage, all_nodes, Some(&targets), None)
            }
            Stage::Remove | Stage::Uninstall => inventory::render(cluster, plan.stage, all_nodes, None, Some(&participating)),
            _ => inventory::render(cluster, plan.stage, all_nodes, None, None),
        };
        Ok(rendered)
    }

    async fn transition_nodes(&self, ids: &[NodeId], to: NodeStatus) -> Result<(), OrchestratorError> {
        for id in ids {
            self.store
                .update_node(*id, |n| {
                    if let Err(e) = n.transition(to) {
                        warn!(node_id = %n.id, error = %e, "ignoring illegal node transition during orchestration");
                    }
                })
                .await?;
        }
        Ok(())
    }
}
