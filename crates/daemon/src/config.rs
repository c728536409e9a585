// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary.

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("RKE2_CREDENTIAL_KEY must be set to a 32-byte value (base64 or raw); got {0} bytes")]
    BadCredentialKeyLength(usize),
    #[error("RKE2_BIND_ADDR '{0}' is not a valid socket address")]
    BadBindAddr(String),
}

/// Snapshot file location. `RKE2_DB_PATH`, default `./rke2-orchestrator.json`.
pub fn db_path() -> PathBuf {
    std::env::var("RKE2_DB_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("rke2-orchestrator.json"))
}

/// Directory the Job Runner writes per-job work directories (inventory,
/// extras, scoped secret files) under. Derived from `RKE2_DB_PATH`'s parent
/// so both live under the same operator-chosen state root.
pub fn work_dir_root() -> PathBuf {
    db_path().parent().map(|p| p.join("work")).unwrap_or_else(|| PathBuf::from("work"))
}

/// Where uploaded/fetched kubeconfig documents are cached, one file per
/// cluster id. Not part of the core data model; a plain file cache is
/// enough for the `fetch-kubeconfig`/`upload-kubeconfig` illustrative
/// bindings.
pub fn kubeconfig_dir() -> PathBuf {
    db_path().parent().map(|p| p.join("kubeconfigs")).unwrap_or_else(|| PathBuf::from("kubeconfigs"))
}

/// AES-256-GCM key for the credential store. `RKE2_CREDENTIAL_KEY`, read as
/// raw bytes if exactly 32 long, otherwise decoded as base64.
pub fn credential_key() -> Result<[u8; 32], ConfigError> {
    let raw = std::env::var("RKE2_CREDENTIAL_KEY").unwrap_or_default();
    let bytes = if raw.len() == 32 {
        raw.into_bytes()
    } else {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(raw.as_bytes()).unwrap_or_default()
    };
    bytes.try_into().map_err(|v: Vec<u8>| ConfigError::BadCredentialKeyLength(v.len()))
}

/// Optional analyzer endpoint. Absent disables the analyzer adapter
/// entirely; `preflight_check`/`upgrade_check` still run, `analyzer_summary`
/// simply stays `None`.
pub fn analyzer_endpoint() -> Option<String> {
    std::env::var("RKE2_ANALYZER_ENDPOINT").ok().filter(|s| !s.is_empty())
}

pub fn analyzer_model() -> Option<String> {
    std::env::var("RKE2_ANALYZER_MODEL").ok().filter(|s| !s.is_empty())
}

/// HTTP bind address. `RKE2_BIND_ADDR`, default `0.0.0.0:8080`.
pub fn bind_addr() -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var("RKE2_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    raw.parse().map_err(|_| ConfigError::BadBindAddr(raw))
}

/// `ansible-playbook` binary path. `RKE2_ANSIBLE_BIN`, default `ansible-playbook`.
pub fn ansible_bin() -> String {
    std::env::var("RKE2_ANSIBLE_BIN").unwrap_or_else(|_| "ansible-playbook".to_string())
}

/// Whether to run lock reconciliation at startup: orphaned locks from a
/// prior crash are rehabilitated before serving traffic.
/// `RKE2_LOCK_STARTUP_RECONCILE`, default true; disabling it is test-only.
pub fn lock_startup_reconcile() -> bool {
    std::env::var("RKE2_LOCK_STARTUP_RECONCILE").ok().and_then(|s| s.parse::<bool>().ok()).unwrap_or(true)
}
