// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle and streaming endpoints. `GET
//! /jobs/{id}/stream` adapts `JobApi::stream()`'s pull-based
//! `JobOutputStream::next().await` loop into an axum SSE response: one
//! event per output chunk, the stream ends once the job closes its bus.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use rke2_core::{ClusterId, JobId};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ListJobsQuery {
    pub cluster_id: Option<String>,
}

pub async fn list_jobs(State(state): State<AppState>, Query(query): Query<ListJobsQuery>) -> impl IntoResponse {
    let cluster_id = query.cluster_id.map(ClusterId::from_string);
    Json(state.api.list_jobs(cluster_id).await)
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let job = state.api.get_job(JobId::from_string(job_id)).await?;
    Ok(Json(job))
}

pub async fn install(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let job_id = state.api.install(ClusterId::from_string(cluster_id)).await?;
    Ok(Json(serde_json::json!({ "job_id": job_id })))
}

#[derive(Debug, Deserialize)]
pub struct UninstallQuery {
    pub confirmation: String,
}

pub async fn uninstall(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Query(query): Query<UninstallQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let job_id = state.api.uninstall(ClusterId::from_string(cluster_id), &query.confirmation).await?;
    Ok(Json(serde_json::json!({ "job_id": job_id })))
}

pub async fn terminate(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    state.api.cancel(JobId::from_string(job_id)).await?;
    Ok(axum::http::StatusCode::ACCEPTED)
}

/// One SSE event per output chunk; the channel closes (ending the
/// response) once `JobOutputStream::next()` returns `None`, which happens
/// after the job's Event Bus is closed and its snapshot fully drained.
pub async fn stream(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<ReceiverStream<Result<Event, Infallible>>>, HttpError> {
    let job_id = JobId::from_string(job_id);
    let mut output = state.api.stream(job_id).await?;

    let (tx, rx) = tokio::sync::mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(chunk) = output.next().await {
            let event = match serde_json::to_string(&chunk) {
                Ok(payload) => Event::default().data(payload),
                Err(_) => continue,
            };
            if tx.send(Ok(event)).await.is_err() {
                break;
            }
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
