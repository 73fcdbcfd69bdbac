//! Last-successful-rebalance marker.
//!
//! A single small JSON file whose timestamp drives the cooldown check.
//! Written atomically (temp file + fsync + rename) so a crash mid-write
//! can never leave a torn marker; after every successful write the
//! marker is backed up.

use crate::backup::BackupManager;
use crate::error::PersistenceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Marker contents: when the last rebalance fully completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceStateMarker {
    pub timestamp: DateTime<Utc>,
}

/// File-backed store for the rebalance marker.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    backup: Option<BackupManager>,
}

impl StateStore {
    /// Store at `path`; when `backup` is given, every save is followed
    /// by a checksummed backup of the marker file.
    pub fn new(path: impl Into<PathBuf>, backup: Option<BackupManager>) -> PersistenceResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path, backup })
    }

    /// Load the marker, or `None` when no rebalance has completed yet.
    ///
    /// A corrupt marker is treated the same as a missing one (with a
    /// warning); the cooldown then simply does not suppress.
    pub fn load(&self) -> PersistenceResult<Option<RebalanceStateMarker>> {
        let body = match std::fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&body) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                warn!(path = %self.path.display(), ?e, "Corrupt rebalance marker, ignoring");
                Ok(None)
            }
        }
    }

    /// Advance the marker to `timestamp`. Atomic on POSIX rename
    /// semantics.
    pub fn save(&self, timestamp: DateTime<Utc>) -> PersistenceResult<()> {
        let marker = RebalanceStateMarker { timestamp };
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&serde_json::to_vec_pretty(&marker)?)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), %timestamp, "Rebalance marker advanced");

        if let Some(backup) = &self.backup {
            // Backup failure must not fail the rebalance itself.
            if let Err(e) = backup.backup(&self.path) {
                warn!(?e, "Marker backup failed");
            }
        }
        Ok(())
    }

    /// Marker file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("last_rebalance.json"), None).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("last_rebalance.json"), None).unwrap();

        let when = "2026-08-26T14:30:00Z".parse::<DateTime<Utc>>().unwrap();
        store.save(when).unwrap();

        let marker = store.load().unwrap().unwrap();
        assert_eq!(marker.timestamp, when);
        // No temp file left behind.
        assert!(!dir.path().join("last_rebalance.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_marker_treated_as_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_rebalance.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = StateStore::new(&path, None).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_triggers_backup() {
        let dir = TempDir::new().unwrap();
        let backup_dir = dir.path().join("backups");
        let backup = BackupManager::new(&backup_dir, 30).unwrap();
        let store =
            StateStore::new(dir.path().join("last_rebalance.json"), Some(backup)).unwrap();

        store.save(Utc::now()).unwrap();

        let copies: Vec<_> = std::fs::read_dir(&backup_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(copies.iter().any(|n| n.ends_with(".json") && n.starts_with("last_rebalance_")));
        assert!(copies.iter().any(|n| n.ends_with(".sha256")));
    }
}
