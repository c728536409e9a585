// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator Adapter traits: thin interfaces to the
//! credential store, the playbook process, the cluster-status probe, and
//! the optional analyzer. These are the only seams through which
//! `rke2-engine` touches the outside world.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rke2_core::{Cluster, CredentialId, CredentialKind, SecretMaterial};

use crate::error::{AnalyzerError, CredentialError, PlaybookError, ProbeError};

/// `fetch(credential_id) -> (user, secret_material, kind)`. The secret is
/// opaque: the engine never inspects or logs it.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn fetch(&self, id: CredentialId) -> Result<(String, SecretMaterial, CredentialKind), CredentialError>;
}

/// Which signal to send a running playbook subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

/// A handle to a spawned playbook subprocess: merged stdout+stderr as a
/// byte stream (here: an async line channel), `wait()`, and `signal()`.
#[async_trait]
pub trait PlaybookHandle: Send {
    /// Read the next merged output line, or `None` once the process's
    /// output streams have both closed.
    async fn next_line(&mut self) -> Option<(rke2_core::ChunkStream, String)>;

    /// Block until the subprocess exits, returning its exit code.
    async fn wait(&mut self) -> Result<i32, PlaybookError>;

    async fn signal(&mut self, signal: Signal) -> Result<(), PlaybookError>;
}

/// `spawn(playbook_path, inventory_path, extras_path, private_key_path?) -> handle`.
#[async_trait]
pub trait PlaybookProcess: Send + Sync {
    async fn spawn(
        &self,
        playbook: &str,
        inventory_path: &Path,
        extras_path: &Path,
        private_key_path: Option<&Path>,
    ) -> Result<Box<dyn PlaybookHandle>, PlaybookError>;
}

/// `status(cluster) -> structured document`. Used by the UI collaborator,
/// not by the orchestrator's correctness path — failures
/// are always non-fatal and never block an orchestrator path.
#[async_trait]
pub trait ClusterStatusProbe: Send + Sync {
    async fn status(&self, cluster: &Cluster) -> Result<serde_json::Value, ProbeError>;
}

/// Verdict returned by the optional analyzer collaborator.
#[derive(Debug, Clone)]
pub struct AnalyzerResponse {
    pub verdict: rke2_core::AnalyzerVerdict,
    pub blockers: Vec<String>,
    pub risks: Vec<String>,
    pub action_plan: Vec<String>,
    pub model_id: Option<String>,
    pub token_count: Option<u64>,
}

/// `analyze(preflight_document) -> {verdict, blockers, risks, action_plan, ...}`.
/// Failures are surfaced as warnings on the job, never fatal.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, preflight_document: &serde_json::Value) -> Result<AnalyzerResponse, AnalyzerError>;
}

/// Best-effort TCP reachability probe used by guardrail G1.
/// Injected as a trait so G1's one piece of I/O is independently mockable
/// while G2-G4 remain pure functions over an immutable snapshot.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn probe(&self, address: &str, port: u16, timeout: std::time::Duration) -> bool;
}

/// Real TCP connect probe.
#[derive(Debug, Clone, Default)]
pub struct TcpPortProbe;

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn probe(&self, address: &str, port: u16, timeout: std::time::Duration) -> bool {
        let addr = format!("{address}:{port}");
        matches!(
            tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        )
    }
}

/// Where an in-flight job's rendered inventory, extras, and (while running)
/// secret file live. Returned by the Job Runner's working-directory setup
/// and consumed by [`PlaybookProcess::spawn`].
#[derive(Debug, Clone)]
pub struct JobWorkDir {
    pub root: PathBuf,
    pub inventory_path: PathBuf,
    pub extras_path: PathBuf,
}
