// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for every collaborator adapter trait, gated behind the
//! `test-support` feature so `rke2-engine`'s test suite can drive the Job
//! Runner and Stage Orchestrator without a real SSH fleet or subprocess.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rke2_core::{AnalyzerVerdict, ChunkStream, Cluster, CredentialId, CredentialKind, SecretMaterial};

use crate::error::{AnalyzerError, CredentialError, PlaybookError, ProbeError};
use crate::traits::{Analyzer, AnalyzerResponse, ClusterStatusProbe, PlaybookHandle, PlaybookProcess, PortProbe, Signal};

/// Always returns a fixed fake credential, regardless of the id requested.
#[derive(Clone)]
pub struct FakeCredentialStore {
    pub login_user: String,
    pub secret: String,
    pub kind: CredentialKind,
}

impl Default for FakeCredentialStore {
    fn default() -> Self {
        Self { login_user: "root".to_string(), secret: "fake-key-material".to_string(), kind: CredentialKind::Key }
    }
}

#[async_trait]
impl crate::traits::CredentialStore for FakeCredentialStore {
    async fn fetch(&self, _id: CredentialId) -> Result<(String, SecretMaterial, CredentialKind), CredentialError> {
        Ok((self.login_user.clone(), SecretMaterial::new(self.secret.clone()), self.kind))
    }
}

/// A scripted fake playbook process: each `spawn` call consumes the next
/// scripted outcome (lines + exit code), or fails if the script is empty.
pub struct FakePlaybookProcess {
    scripts: Mutex<VecDeque<ScriptedRun>>,
}

pub struct ScriptedRun {
    pub lines: Vec<(ChunkStream, String)>,
    pub exit_code: i32,
}

impl ScriptedRun {
    pub fn success(lines: impl IntoIterator<Item = &'static str>) -> Self {
        Self { lines: lines.into_iter().map(|l| (ChunkStream::Stdout, l.to_string())).collect(), exit_code: 0 }
    }

    pub fn failure(lines: impl IntoIterator<Item = &'static str>) -> Self {
        Self { lines: lines.into_iter().map(|l| (ChunkStream::Stderr, l.to_string())).collect(), exit_code: 1 }
    }
}

impl FakePlaybookProcess {
    pub fn new(scripts: Vec<ScriptedRun>) -> Self {
        Self { scripts: Mutex::new(scripts.into()) }
    }
}

#[async_trait]
impl PlaybookProcess for FakePlaybookProcess {
    async fn spawn(
        &self,
        _playbook: &str,
        _inventory_path: &Path,
        _extras_path: &Path,
        _private_key_path: Option<&Path>,
    ) -> Result<Box<dyn PlaybookHandle>, PlaybookError> {
        let run = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| PlaybookError::Spawn(std::io::Error::other("no more scripted runs")))?;
        Ok(Box::new(FakeHandle { lines: run.lines.into(), exit_code: run.exit_code, cancelled: Arc::new(Mutex::new(false)) }))
    }
}

struct FakeHandle {
    lines: VecDeque<(ChunkStream, String)>,
    exit_code: i32,
    cancelled: Arc<Mutex<bool>>,
}

#[async_trait]
impl PlaybookHandle for FakeHandle {
    async fn next_line(&mut self) -> Option<(ChunkStream, String)> {
        if *self.cancelled.lock() {
            return None;
        }
        self.lines.pop_front()
    }

    async fn wait(&mut self) -> Result<i32, PlaybookError> {
        if *self.cancelled.lock() {
            return Ok(143); // SIGTERM convention
        }
        Ok(self.exit_code)
    }

    async fn signal(&mut self, _signal: Signal) -> Result<(), PlaybookError> {
        *self.cancelled.lock() = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeStatusProbe;

#[async_trait]
impl ClusterStatusProbe for FakeStatusProbe {
    async fn status(&self, cluster: &Cluster) -> Result<serde_json::Value, ProbeError> {
        Ok(serde_json::json!({ "cluster_id": cluster.id.to_string(), "nodes": [] }))
    }
}

#[derive(Debug, Clone)]
pub struct FakeAnalyzer {
    pub verdict: AnalyzerVerdict,
}

impl Default for FakeAnalyzer {
    fn default() -> Self {
        Self { verdict: AnalyzerVerdict::Go }
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, _preflight_document: &serde_json::Value) -> Result<AnalyzerResponse, AnalyzerError> {
        Ok(AnalyzerResponse {
            verdict: self.verdict,
            blockers: Vec::new(),
            risks: Vec::new(),
            action_plan: Vec::new(),
            model_id: Some("fake-model".to_string()),
            token_count: Some(0),
        })
    }
}

/// Always (or never) reachable, as configured.
#[derive(Debug, Clone, Copy)]
pub struct FakePortProbe {
    pub reachable: bool,
}

impl Default for FakePortProbe {
    fn default() -> Self {
        Self { reachable: true }
    }
}

#[async_trait]
impl PortProbe for FakePortProbe {
    async fn probe(&self, _address: &str, _port: u16, _timeout: std::time::Duration) -> bool {
        self.reachable
    }
}
