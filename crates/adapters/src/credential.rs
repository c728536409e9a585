// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `FileCredentialStore`: an on-disk, encrypted-at-rest JSON map of
//! `CredentialId -> EncryptedSecret`, decrypting only at `fetch` time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use base64::Engine;
use rke2_core::{CredentialId, CredentialKind, SecretMaterial};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;
use crate::traits::CredentialStore;

const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    login_user: String,
    kind: CredentialKind,
    /// base64(nonce || ciphertext).
    payload: String,
}

/// Reads a JSON file of `CredentialId -> StoredEntry` and decrypts secret
/// material with AES-256-GCM using a key sourced from `RKE2_CREDENTIAL_KEY`
/// (or supplied directly, for tests).
pub struct FileCredentialStore {
    path: PathBuf,
    cipher: Aes256Gcm,
}

impl FileCredentialStore {
    /// `key` must be exactly 32 bytes. Typically derived from the
    /// `RKE2_CREDENTIAL_KEY` environment variable by the daemon's config
    /// loader.
    pub fn new(path: impl Into<PathBuf>, key: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Self { path: path.into(), cipher }
    }

    fn read_map(&self) -> Result<HashMap<String, StoredEntry>, CredentialError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_map(&self, map: &HashMap<String, StoredEntry>) -> Result<(), CredentialError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Encrypt and store a secret. Not part of the `CredentialStore` trait
    /// (the engine only ever reads); used by the credential-management
    /// side of the HTTP surface and by tests.
    pub fn put(
        &self,
        id: CredentialId,
        login_user: impl Into<String>,
        kind: CredentialKind,
        plaintext: &str,
        nonce_bytes: &[u8; NONCE_LEN],
    ) -> Result<(), CredentialError> {
        let nonce = Nonce::from_slice(nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CredentialError::Decrypt(e.to_string()))?;
        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        let mut map = self.read_map()?;
        map.insert(
            id.to_string(),
            StoredEntry {
                login_user: login_user.into(),
                kind,
                payload: base64::engine::general_purpose::STANDARD.encode(payload),
            },
        );
        self.write_map(&map)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn fetch(&self, id: CredentialId) -> Result<(String, SecretMaterial, CredentialKind), CredentialError> {
        let map = self.read_map()?;
        let entry = map.get(id.as_str()).ok_or_else(|| CredentialError::NotFound(id.to_string()))?;
        let payload = base64::engine::general_purpose::STANDARD
            .decode(&entry.payload)
            .map_err(|e| CredentialError::Decrypt(e.to_string()))?;
        if payload.len() < NONCE_LEN {
            return Err(CredentialError::Decrypt("payload too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CredentialError::Decrypt(e.to_string()))?;
        let plaintext = String::from_utf8(plaintext).map_err(|e| CredentialError::Decrypt(e.to_string()))?;
        Ok((entry.login_user.clone(), SecretMaterial::new(plaintext), entry.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key() -> [u8; 32] {
        [7u8; 32]
    }

    #[tokio::test]
    async fn round_trips_a_stored_secret() {
        let dir = tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("creds.json"), &key());
        let id = CredentialId::new();
        store.put(id, "root", CredentialKind::Key, "-----BEGIN KEY-----", &[1u8; 12]).unwrap();

        let (user, secret, kind) = store.fetch(id).await.unwrap();
        assert_eq!(user, "root");
        assert_eq!(kind, CredentialKind::Key);
        assert_eq!(secret.expose(), "-----BEGIN KEY-----");
    }

    #[tokio::test]
    async fn fetch_unknown_id_errors() {
        let dir = tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("creds.json"), &key());
        let err = store.fetch(CredentialId::new()).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound(_)));
    }
}
