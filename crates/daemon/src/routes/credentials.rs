// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `POST /credentials/test-access`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rke2_core::CredentialId;
use serde::Deserialize;

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TestAccessRequest {
    pub credential_id: CredentialId,
}

pub async fn test_access(
    State(state): State<AppState>,
    Json(req): Json<TestAccessRequest>,
) -> Result<impl IntoResponse, HttpError> {
    state.api.test_credential_access(req.credential_id).await?;
    Ok(StatusCode::OK)
}
