// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Collaborator Adapters: thin interfaces to the credential
//! store, the playbook process, the cluster-status probe, and the optional
//! analyzer, plus deployable default implementations. The engine crate
//! depends only on the traits in [`traits`]; everything else here is a
//! swappable concrete adapter.

pub mod analyzer;
pub mod credential;
pub mod error;
pub mod playbook;
pub mod probe;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use analyzer::HttpAnalyzer;
pub use credential::FileCredentialStore;
pub use error::{AnalyzerError, CredentialError, PlaybookError, ProbeError};
pub use playbook::AnsiblePlaybookRunner;
pub use probe::KubeStatusProbe;
pub use traits::{
    Analyzer, AnalyzerResponse, ClusterStatusProbe, CredentialStore, JobWorkDir, PlaybookHandle, PlaybookProcess,
    PortProbe, Signal, TcpPortProbe,
};
