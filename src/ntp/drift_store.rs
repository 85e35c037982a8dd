//! Persisted per-peer drift model (§4.4).
//!
//! A linear `offset = gradient * t + intercept` model, keyed by peer
//! address, carried across sessions so a freshly (re)connected source gets
//! a usable drift estimate before its own exchange history has converged.

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Linear drift model for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftModel {
    /// Offset-rate-of-change, ns per ns of elapsed local time.
    pub gradient: f64,
    /// Offset at `t = 0` (first sample's local time), in ns.
    pub intercept: f64,
    /// Local time the intercept is relative to, ns.
    pub epoch: i64,
}

impl DriftModel {
    /// Project the model forward to `local_time`.
    pub fn predict_offset(&self, local_time: i64) -> f64 {
        self.intercept + self.gradient * (local_time - self.epoch) as f64
    }
}

/// On-disk table of [`DriftModel`]s keyed by peer IP, loaded once at
/// startup and flushed after each update.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DriftTable {
    peers: HashMap<IpAddr, DriftModel>,
}

/// Errors persisting or loading the drift table.
#[derive(Debug, thiserror::Error)]
pub enum DriftStoreError {
    /// Filesystem I/O failure.
    #[error("drift store I/O error: {0}")]
    Io(#[from] io::Error),
    /// The stored table is not valid JSON for [`DriftTable`].
    #[error("drift store deserialisation error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Loads and persists [`DriftModel`]s across process restarts.
pub struct DriftStore {
    path: PathBuf,
    table: DriftTable,
}

impl DriftStore {
    /// Load the table at `path`, treating a missing file as an empty table.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DriftStoreError> {
        let path = path.into();
        let table = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => DriftTable::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, table })
    }

    /// Look up the model for `peer`, if any session has ever persisted one.
    pub fn get(&self, peer: IpAddr) -> Option<DriftModel> {
        self.table.peers.get(&peer).copied()
    }

    /// Update the model for `peer` and flush the table to disk.
    pub fn put(&mut self, peer: IpAddr, model: DriftModel) -> Result<(), DriftStoreError> {
        self.table.peers.insert(peer, model);
        self.flush()
    }

    fn flush(&self) -> Result<(), DriftStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.table)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Path this store reads from / writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DriftStore::open(dir.path().join("drift.json")).unwrap();
        assert!(store
            .get(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)))
            .is_none());
    }

    #[test]
    fn put_then_reopen_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.json");
        let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let model = DriftModel {
            gradient: 0.0001,
            intercept: 1234.0,
            epoch: 5_000,
        };

        {
            let mut store = DriftStore::open(&path).unwrap();
            store.put(peer, model).unwrap();
        }

        let store = DriftStore::open(&path).unwrap();
        assert_eq!(store.get(peer), Some(model));
    }

    #[test]
    fn predict_offset_applies_gradient_from_epoch() {
        let model = DriftModel {
            gradient: 2.0,
            intercept: 100.0,
            epoch: 10,
        };
        assert_eq!(model.predict_offset(10), 100.0);
        assert_eq!(model.predict_offset(20), 120.0);
    }
}
