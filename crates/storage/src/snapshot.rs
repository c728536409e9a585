// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-state snapshot persistence: write-to-temp + rename, with a
//! rotating set of up to three `.bak` backups, mirroring the
//! snapshot/checkpoint discipline of long-running stateful daemons in the
//! corpus (§4.1 expanded).

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::state::TopologyState;

const MAX_BACKUPS: u32 = 3;

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot from disk, or an empty state if it does not yet
    /// exist (first boot).
    pub fn load(&self) -> Result<TopologyState, StoreError> {
        if !self.path.exists() {
            return Ok(TopologyState::default());
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist the state: serialize, write to a sibling temp file, rotate
    /// up to [`MAX_BACKUPS`] numbered `.bak` files, then atomically rename
    /// the temp file into place. A crash mid-write leaves either the old
    /// snapshot or the new one intact, never a half-written file.
    pub fn save(&self, state: &TopologyState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes)?;

        if self.path.exists() {
            self.rotate_backups()?;
            let bak_path = self.backup_path(1);
            std::fs::copy(&self.path, &bak_path)?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut s = self.path.as_os_str().to_os_string();
        s.push(format!(".bak{n}"));
        PathBuf::from(s)
    }

    fn rotate_backups(&self) -> Result<(), StoreError> {
        for n in (1..MAX_BACKUPS).rev() {
            let from = self.backup_path(n);
            let to = self.backup_path(n + 1);
            if from.exists() {
                std::fs::rename(&from, &to)?;
            }
        }
        let oldest = self.backup_path(MAX_BACKUPS);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rke2_core::ClusterBuilder;
    use tempfile::tempdir;

    #[test]
    fn round_trips_an_empty_state() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("topology.json"));
        let loaded = store.load().expect("load");
        assert!(loaded.clusters.is_empty());
    }

    #[test]
    fn save_then_load_preserves_a_cluster() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("topology.json"));

        let mut state = TopologyState::default();
        let cluster = ClusterBuilder::default().name("c1").build();
        let id = cluster.id;
        state.clusters.insert(id, cluster);
        store.save(&state).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.clusters.get(&id).map(|c| c.name.as_str()), Some("c1"));
    }

    #[test]
    fn rotates_backups_on_repeated_saves() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("topology.json");
        let store = SnapshotStore::new(&path);

        for i in 0..5 {
            let mut state = TopologyState::default();
            let cluster = ClusterBuilder::default().name(format!("c{i}")).build();
            state.clusters.insert(cluster.id, cluster);
            store.save(&state).expect("save");
        }

        assert!(path.with_extension("json.bak1").exists() || dir.path().join("topology.json.bak1").exists());
        assert!(dir.path().join("topology.json.bak1").exists());
        assert!(dir.path().join("topology.json.bak3").exists());
        assert!(!dir.path().join("topology.json.bak4").exists());
    }
}
