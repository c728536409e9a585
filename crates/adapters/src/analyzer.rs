// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HttpAnalyzer`: a `reqwest`-based client posting a preflight document to
//! the configured analyzer endpoint/model id. Absent
//! endpoint configuration disables the feature entirely — the engine never
//! constructs this adapter in that case, so a job's `analyzer_summary`
//! simply stays `None`.

use async_trait::async_trait;
use rke2_core::AnalyzerVerdict;
use serde::Deserialize;

use crate::error::AnalyzerError;
use crate::traits::{Analyzer, AnalyzerResponse};

pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    model_id: Option<String>,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>, model_id: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), model_id }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzerWireResponse {
    verdict: AnalyzerVerdict,
    #[serde(default)]
    blockers: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    action_plan: Vec<String>,
    #[serde(default)]
    token_count: Option<u64>,
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, preflight_document: &serde_json::Value) -> Result<AnalyzerResponse, AnalyzerError> {
        let mut body = serde_json::json!({ "document": preflight_document });
        if let Some(model_id) = &self.model_id {
            body["model_id"] = serde_json::Value::String(model_id.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyzerError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| AnalyzerError::Request(e.to_string()))?;

        let parsed: AnalyzerWireResponse =
            response.json().await.map_err(|e| AnalyzerError::Parse(e.to_string()))?;

        Ok(AnalyzerResponse {
            verdict: parsed.verdict,
            blockers: parsed.blockers,
            risks: parsed.risks,
            action_plan: parsed.action_plan,
            model_id: self.model_id.clone(),
            token_count: parsed.token_count,
        })
    }
}
