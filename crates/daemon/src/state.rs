// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared axum application state: the `JobApi` facade plus the bits of
//! daemon-local plumbing (kubeconfig cache directory) that sit outside
//! `rke2-engine`'s scope.

use std::path::PathBuf;
use std::sync::Arc;

use rke2_engine::JobApi;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<JobApi>,
    pub kubeconfig_dir: PathBuf,
}
