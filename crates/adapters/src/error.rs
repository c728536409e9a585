// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter-specific error types. The engine converts
//! every one of these into `ApiError::RunnerError` or `ApiError::StoreError`
//! at the seam; adapter types never cross the `rke2-engine` boundary.

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential '{0}' not found in the credential store")]
    NotFound(String),

    #[error("failed to decrypt credential: {0}")]
    Decrypt(String),

    #[error("credential store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybookError {
    #[error("failed to spawn playbook process: {0}")]
    Spawn(std::io::Error),

    #[error("failed to write secret file: {0}")]
    SecretFile(std::io::Error),

    #[error("failed to signal playbook process: {0}")]
    Signal(String),

    #[error("failed to wait on playbook process: {0}")]
    Wait(std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to build kube client: {0}")]
    Client(String),

    #[error("failed to query cluster status: {0}")]
    Query(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("analyzer request failed: {0}")]
    Request(String),

    #[error("analyzer response could not be parsed: {0}")]
    Parse(String),
}
