// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped secret file handling: a RAII type that creates
//! the decrypted credential file with `0o600` permissions in a per-job
//! temp directory and removes it in `Drop`, guaranteeing cleanup on every
//! exit path including a cancelled stage.

use std::path::{Path, PathBuf};

use rke2_core::SecretMaterial;

pub struct SecretFile {
    path: PathBuf,
}

impl SecretFile {
    pub fn write(dir: &Path, file_name: &str, secret: &SecretMaterial) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, secret.expose())?;
        set_owner_only_permissions(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl Drop for SecretFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
