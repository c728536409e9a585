// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `rke2-daemon`: wires the Topology Store, Collaborator Adapters, and
//! `rke2_engine::JobApi` into an axum HTTP server.
//! `main.rs` is the thin binary entry point; everything reusable by tests
//! lives here.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use rke2_adapters::{Analyzer, AnsiblePlaybookRunner, FileCredentialStore, HttpAnalyzer, KubeStatusProbe, TcpPortProbe};
use rke2_engine::JobApi;
use rke2_storage::TopologyStore;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] rke2_storage::StoreError),
    #[error("failed to create directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the application state: open (or create) the Topology Store, run
/// startup lock reconciliation unless disabled, and construct every
/// Collaborator Adapter from environment configuration.
pub async fn bootstrap() -> Result<AppState, BootstrapError> {
    let db_path = config::db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = TopologyStore::open(db_path)?;

    if config::lock_startup_reconcile() {
        let rehabilitated = store.reconcile_startup(chrono::Utc::now()).await?;
        if !rehabilitated.is_empty() {
            warn!(count = rehabilitated.len(), "rehabilitated orphaned cluster locks from a prior restart");
        }
    }

    let work_dir_root = config::work_dir_root();
    std::fs::create_dir_all(&work_dir_root)?;
    let kubeconfig_dir = config::kubeconfig_dir();

    let credentials = Arc::new(FileCredentialStore::new(
        db_path_sibling("credentials.json"),
        &config::credential_key()?,
    ));
    let playbooks = Arc::new(AnsiblePlaybookRunner::new(config::ansible_bin()));
    let port_probe = Arc::new(TcpPortProbe);
    let status_probe = Arc::new(KubeStatusProbe);
    let analyzer: Option<Arc<dyn Analyzer>> = config::analyzer_endpoint()
        .map(|endpoint| Arc::new(HttpAnalyzer::new(endpoint, config::analyzer_model())) as Arc<dyn Analyzer>);
    if analyzer.is_none() {
        info!("RKE2_ANALYZER_ENDPOINT not set; preflight/upgrade-check will run without an analyzer verdict");
    }

    let api = Arc::new(JobApi::new(store, credentials, playbooks, port_probe, status_probe, analyzer, work_dir_root));
    Ok(AppState { api, kubeconfig_dir })
}

fn db_path_sibling(name: &str) -> std::path::PathBuf {
    config::db_path().parent().map(|p| p.join(name)).unwrap_or_else(|| std::path::PathBuf::from(name))
}
