// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps `rke2_core::ApiError` onto HTTP status codes and a `{error,
//! detail}` JSON body. The only translation performed here
//! is status-code selection; the message text is `ApiError`'s own
//! `Display` output.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rke2_core::ApiError;
use serde_json::json;

pub struct HttpError(pub ApiError);

impl From<ApiError> for HttpError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::GuardrailRejection { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::JobFailure { .. } => StatusCode::OK,
            ApiError::RunnerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.kind(), "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rke2_core::{ClusterId, JobId};

    #[test]
    fn conflict_maps_to_409() {
        let err = HttpError(ApiError::Conflict {
            cluster_id: ClusterId::new(),
            operation_name: "install".to_string(),
            current_job: JobId::new(),
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn guardrail_rejection_maps_to_400() {
        let err = HttpError(ApiError::GuardrailRejection { guardrail: "G2", reason: "below majority".to_string() });
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = HttpError(ApiError::not_found_cluster(ClusterId::new()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
