// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential: an opaque secret reference. The core never inspects or logs
//! the plaintext.

use crate::id::CredentialId;

/// Whether the secret material is an SSH private key or a login password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Key,
    Password,
}

crate::simple_display!(CredentialKind {
    Key => "key",
    Password => "password",
});

/// Plaintext secret material. `Debug` and `Display` are redacted so the
/// plaintext cannot reach a log line by accident — the Rust-native
/// equivalent of "the core never inspects or logs the plaintext."
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SecretMaterial(String);

impl SecretMaterial {
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self(plaintext.into())
    }

    /// Access the plaintext. Callers must not log or persist the returned
    /// slice outside of the narrow paths that need it (writing the secret
    /// file, passing it to the playbook process).
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretMaterial(***)")
    }
}

impl std::fmt::Display for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// A stored SSH credential. The `secret` field is the encrypted-at-rest
/// form; adapters decrypt it into [`SecretMaterial`] only at `fetch` time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub name: String,
    pub login_user: String,
    pub kind: CredentialKind,
    /// Opaque encrypted bytes, base64-encoded for JSON storage.
    pub encrypted_secret: String,
}

crate::builder! {
    pub struct CredentialBuilder => Credential {
        into {
            name: String = "default",
            login_user: String = "root",
            encrypted_secret: String = "",
        }
        set {
            kind: CredentialKind = CredentialKind::Key,
        }
        computed {
            id: CredentialId = CredentialId::new(),
        }
    }
}
