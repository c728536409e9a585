// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster CRUD, scaling, and status endpoints. Every handler
//! is a thin translation from the HTTP request onto one `JobApi` call; no
//! business logic lives here.

use std::path::PathBuf;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rke2_core::{ClusterId, CredentialId, ImageOverrides, NetworkPlugin, NodeId, RegistrySettings};
use rke2_engine::{NewClusterParams, NodeSpec};
use serde::Deserialize;

use crate::error::HttpError;
use crate::state::AppState;

pub async fn list_clusters(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.api.list_clusters().await)
}

pub async fn get_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let cluster = state.api.get_cluster(ClusterId::from_string(cluster_id)).await?;
    Ok(Json(cluster))
}

pub async fn create_cluster(
    State(state): State<AppState>,
    Json(params): Json<NewClusterParams>,
) -> Result<impl IntoResponse, HttpError> {
    let cluster = state.api.create_cluster(params).await?;
    Ok((StatusCode::CREATED, Json(cluster)))
}

pub async fn register_cluster(
    State(state): State<AppState>,
    Json(params): Json<NewClusterParams>,
) -> Result<impl IntoResponse, HttpError> {
    let cluster = state.api.register_cluster(params).await?;
    Ok((StatusCode::CREATED, Json(cluster)))
}

/// Partial update body for `PUT /clusters/{id}`. Present fields overwrite
/// the stored cluster; absent fields are left untouched.
#[derive(Debug, Deserialize, Default)]
pub struct ClusterUpdateRequest {
    pub name: Option<String>,
    pub target_version: Option<String>,
    pub network_plugin: Option<NetworkPlugin>,
    pub control_plane_endpoint: Option<String>,
    pub bootstrap_token: Option<String>,
    pub credential_id: Option<CredentialId>,
    pub san_list: Option<Vec<String>>,
    pub registry: Option<RegistrySettings>,
    pub image_overrides: Option<ImageOverrides>,
    pub config_document: Option<String>,
}

pub async fn update_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Json(req): Json<ClusterUpdateRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let cluster_id = ClusterId::from_string(cluster_id);
    let cluster = state
        .api
        .update_cluster(cluster_id, |c| {
            if let Some(name) = req.name {
                c.name = name;
            }
            if let Some(v) = req.target_version {
                c.target_version = v;
            }
            if let Some(v) = req.network_plugin {
                c.network_plugin = v;
            }
            if let Some(v) = req.control_plane_endpoint {
                c.control_plane_endpoint = v;
            }
            if let Some(v) = req.bootstrap_token {
                c.bootstrap_token = v;
            }
            if let Some(v) = req.credential_id {
                c.credential_id = v;
            }
            if req.san_list.is_some() {
                c.san_list = req.san_list;
            }
            if req.registry.is_some() {
                c.registry = req.registry;
            }
            if req.image_overrides.is_some() {
                c.image_overrides = req.image_overrides;
            }
            if req.config_document.is_some() {
                c.config_document = req.config_document;
            }
        })
        .await?;
    Ok(Json(cluster))
}

pub async fn delete_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    state.api.delete_cluster(ClusterId::from_string(cluster_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfirmMasterRemovalQuery {
    #[serde(default)]
    pub confirm_master_removal: bool,
}

pub async fn scale_add(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Query(query): Query<ConfirmMasterRemovalQuery>,
    Json(nodes): Json<Vec<NodeSpec>>,
) -> Result<impl IntoResponse, HttpError> {
    let response =
        state.api.add_nodes(ClusterId::from_string(cluster_id), nodes, query.confirm_master_removal).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ScaleRemoveRequest {
    pub node_ids: Vec<NodeId>,
}

pub async fn scale_remove(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Query(query): Query<ConfirmMasterRemovalQuery>,
    Json(req): Json<ScaleRemoveRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = state
        .api
        .remove_nodes(ClusterId::from_string(cluster_id), req.node_ids, query.confirm_master_removal)
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, Default)]
pub struct ReadinessCheckQuery {
    #[serde(default)]
    pub analyze: bool,
    pub target_version: Option<String>,
}

pub async fn preflight_check(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Query(query): Query<ReadinessCheckQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let job_id = state
        .api
        .preflight_check(ClusterId::from_string(cluster_id), query.analyze, query.target_version)
        .await?;
    Ok(Json(serde_json::json!({ "job_id": job_id })))
}

pub async fn upgrade_check(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Query(query): Query<ReadinessCheckQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let job_id = state
        .api
        .upgrade_check(ClusterId::from_string(cluster_id), query.analyze, query.target_version)
        .await?;
    Ok(Json(serde_json::json!({ "job_id": job_id })))
}

pub async fn cluster_status(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let status = state.api.status(ClusterId::from_string(cluster_id)).await?;
    Ok(Json(status))
}

/// `fetch-kubeconfig`/`upload-kubeconfig`: a plain file cache, one document
/// per cluster. Kubeconfig acquisition itself is out of scope; this is just
/// the operator-facing passthrough.
fn kubeconfig_path(state: &AppState, cluster_id: &ClusterId) -> PathBuf {
    state.kubeconfig_dir.join(format!("{cluster_id}.yaml"))
}

pub async fn fetch_kubeconfig(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let cluster_id = ClusterId::from_string(cluster_id);
    state.api.get_cluster(cluster_id).await?;
    let path = kubeconfig_path(&state, &cluster_id);
    match tokio::fs::read_to_string(&path).await {
        Ok(document) => Ok((StatusCode::OK, document).into_response()),
        Err(_) => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

pub async fn upload_kubeconfig(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    body: String,
) -> Result<impl IntoResponse, HttpError> {
    let cluster_id = ClusterId::from_string(cluster_id);
    state.api.get_cluster(cluster_id).await?;
    tokio::fs::create_dir_all(&state.kubeconfig_dir)
        .await
        .map_err(|e| rke2_core::ApiError::StoreError(e.to_string()))?;
    tokio::fs::write(kubeconfig_path(&state, &cluster_id), body)
        .await
        .map_err(|e| rke2_core::ApiError::StoreError(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
