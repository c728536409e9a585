// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job: the persistent record of one user intent's execution.

use crate::id::{ClusterId, JobId};
use chrono::{DateTime, Utc};

/// The kind of operation a job executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Install,
    Uninstall,
    ScaleAddMasters,
    ScaleAddWorkers,
    ScaleRemove,
    PreflightCheck,
    UpgradeCheck,
}

crate::simple_display!(JobKind {
    Install => "install",
    Uninstall => "uninstall",
    ScaleAddMasters => "scale_add_masters",
    ScaleAddWorkers => "scale_add_workers",
    ScaleRemove => "scale_remove",
    PreflightCheck => "preflight_check",
    UpgradeCheck => "upgrade_check",
});

impl JobKind {
    /// Read-only job kinds never transition node status and are exempt from
    /// the mutual-exclusion cluster lock (decided open question, see
    /// DESIGN.md).
    pub fn is_read_only(self) -> bool {
        matches!(self, JobKind::PreflightCheck | JobKind::UpgradeCheck)
    }
}

/// A job's lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

crate::simple_display!(JobStatus {
    Pending => "pending",
    Running => "running",
    Success => "success",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// Which stream an output chunk originated from. Stdout and stderr are
/// merged into one ordered sequence by the Job Runner; this tag lets a
/// consumer distinguish them without losing ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStream {
    Stdout,
    Stderr,
}

/// A single line-oriented output chunk appended to a job's persisted
/// output buffer and forwarded to the Event Bus.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutputChunk {
    /// Monotonically increasing within a job; used for snapshot/live
    /// stream de-duplication.
    pub seq: u64,
    pub stream: ChunkStream,
    pub line: String,
    pub emitted_at: DateTime<Utc>,
}

/// Verdict produced by the optional analyzer for a preflight/upgrade-check
/// document. `GO`/`CAUTION`/`NO-GO` are rendered in upper case to match the
/// operator-facing vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum AnalyzerVerdict {
    Go,
    Caution,
    #[serde(rename = "NO-GO")]
    NoGo,
}

crate::simple_display!(AnalyzerVerdict {
    Go => "GO",
    Caution => "CAUTION",
    NoGo => "NO-GO",
});

/// Structured output of the optional analyzer collaborator. Absent
/// endpoint configuration disables the feature entirely: the field stays
/// `None` on the job rather than this struct existing in a degraded form.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalyzerSummary {
    pub verdict: AnalyzerVerdict,
    pub blockers: Vec<String>,
    pub risks: Vec<String>,
    pub action_plan: Vec<String>,
    pub model_id: Option<String>,
    pub token_count: Option<u64>,
}

/// Structured readiness result produced by a preflight or upgrade-check
/// job, independent of whether the analyzer ran.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ReadinessResult {
    pub checks_passed: Vec<String>,
    pub checks_failed: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub id: JobId,
    pub cluster_id: ClusterId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Vec<OutputChunk>,
    pub readiness_result: Option<ReadinessResult>,
    pub analyzer_summary: Option<AnalyzerSummary>,
    pub target_version: Option<String>,
    /// Set by `cancel(job_id)`; observed cooperatively by the runner's
    /// subprocess-forwarding loop between chunks.
    pub cancel_requested: bool,
    /// Next sequence number to assign to an appended output chunk.
    pub next_chunk_seq: u64,
}

impl Job {
    /// Append a chunk, assigning it the next sequence number. Returns the
    /// assigned chunk for convenience (e.g. to publish on the Event Bus).
    pub fn append_chunk(&mut self, stream: ChunkStream, line: String, emitted_at: DateTime<Utc>) -> OutputChunk {
        let chunk = OutputChunk { seq: self.next_chunk_seq, stream, line, emitted_at };
        self.next_chunk_seq += 1;
        self.output.push(chunk.clone());
        chunk
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        set {
            cluster_id: ClusterId = ClusterId::new(),
            kind: JobKind = JobKind::Install,
            status: JobStatus = JobStatus::Pending,
            cancel_requested: bool = false,
        }
        option {
            target_version: String = None,
        }
        computed {
            id: JobId = JobId::new(),
            created_at: DateTime<Utc> = Utc::now(),
            started_at: Option<DateTime<Utc>> = None,
            completed_at: Option<DateTime<Utc>> = None,
            output: Vec<OutputChunk> = Vec::new(),
            readiness_result: Option<ReadinessResult> = None,
            analyzer_summary: Option<AnalyzerSummary> = None,
            next_chunk_seq: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
