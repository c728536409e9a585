// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP surface, wired onto [`AppState`]. Every route
//! binds directly to a `JobApi` call; no business logic lives past this
//! module.

pub mod clusters;
pub mod credentials;
pub mod health;
pub mod jobs;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/clusters", get(clusters::list_clusters))
        .route("/clusters/new", post(clusters::create_cluster))
        .route("/clusters/register", post(clusters::register_cluster))
        .route(
            "/clusters/{id}",
            get(clusters::get_cluster).put(clusters::update_cluster).delete(clusters::delete_cluster),
        )
        .route("/clusters/{id}/scale/add", post(clusters::scale_add))
        .route("/clusters/{id}/scale/remove", post(clusters::scale_remove))
        .route("/clusters/{id}/preflight-check", post(clusters::preflight_check))
        .route("/clusters/{id}/upgrade-check", post(clusters::upgrade_check))
        .route("/clusters/{id}/status", get(clusters::cluster_status))
        .route("/clusters/{id}/refresh", post(clusters::cluster_status))
        .route("/clusters/{id}/fetch-kubeconfig", post(clusters::fetch_kubeconfig))
        .route("/clusters/{id}/upload-kubeconfig", post(clusters::upload_kubeconfig))
        .route("/credentials/test-access", post(credentials::test_access))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/install/{cluster_id}", post(jobs::install))
        .route("/jobs/uninstall/{cluster_id}", post(jobs::uninstall))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/terminate", post(jobs::terminate))
        .route("/jobs/{id}/stream", get(jobs::stream))
        .with_state(state)
}
