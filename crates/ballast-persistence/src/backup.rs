//! Checksummed state backups with time-based retention.
//!
//! Each backup is a timestamped copy of the source file plus a sha256
//! sidecar in the classic `sha256sum` format (`{hex}  {filename}`).
//! Restore picks the newest copy whose checksum still verifies, so a
//! bit-rotted backup is skipped rather than restored.

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Timestamp embedded in backup file names.
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Manages checksummed copies of state files in one backup directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
    retention_days: i64,
}

impl BackupManager {
    /// Backups under `dir` (created eagerly), pruned after
    /// `retention_days`.
    pub fn new(dir: impl Into<PathBuf>, retention_days: i64) -> PersistenceResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            retention_days,
        })
    }

    /// Back up `source`: timestamped copy plus sha256 sidecar. Prunes
    /// expired backups afterwards. Returns the backup path.
    pub fn backup(&self, source: &Path) -> PersistenceResult<PathBuf> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("state");
        let suffix = source
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| format!(".{s}"))
            .unwrap_or_default();
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT);
        let name = format!("{stem}_{timestamp}{suffix}");
        let backup_path = self.dir.join(&name);

        std::fs::copy(source, &backup_path)?;
        let digest = sha256_hex(&backup_path)?;
        std::fs::write(
            checksum_path(&backup_path),
            format!("{digest}  {name}\n"),
        )?;
        info!(backup = %backup_path.display(), "State backed up");

        self.prune_expired()?;
        Ok(backup_path)
    }

    /// Verify a backup against its sidecar checksum.
    pub fn verify(&self, backup: &Path) -> PersistenceResult<()> {
        let sidecar = checksum_path(backup);
        let recorded = std::fs::read_to_string(&sidecar)
            .map_err(|_| PersistenceError::ChecksumMismatch(backup.display().to_string()))?;
        let recorded_hex = recorded.split_whitespace().next().unwrap_or("");
        let actual = sha256_hex(backup)?;
        if recorded_hex == actual {
            Ok(())
        } else {
            Err(PersistenceError::ChecksumMismatch(
                backup.display().to_string(),
            ))
        }
    }

    /// Restore the newest verifiable backup of `source` back to
    /// `source`'s path. Backups failing verification are skipped with a
    /// warning.
    pub fn restore_latest(&self, source: &Path) -> PersistenceResult<PathBuf> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("state");
        let mut candidates = self.backups_for(stem)?;
        candidates.sort();
        candidates.reverse();

        for candidate in candidates {
            match self.verify(&candidate) {
                Ok(()) => {
                    std::fs::copy(&candidate, source)?;
                    info!(
                        backup = %candidate.display(),
                        target = %source.display(),
                        "State restored from backup"
                    );
                    return Ok(candidate);
                }
                Err(e) => {
                    warn!(backup = %candidate.display(), ?e, "Skipping unverifiable backup");
                }
            }
        }
        Err(PersistenceError::NoBackup(source.display().to_string()))
    }

    /// All backup copies (not sidecars) for files with the given stem.
    fn backups_for(&self, stem: &str) -> PersistenceResult<Vec<PathBuf>> {
        let prefix = format!("{stem}_");
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with(&prefix) && !name.ends_with(".sha256") {
                out.push(path);
            }
        }
        Ok(out)
    }

    /// Delete backups (and their sidecars) older than the retention
    /// window, by file modification time.
    fn prune_expired(&self) -> PersistenceResult<()> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Ok(modified) = path.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if chrono::DateTime::<Utc>::from(modified) < cutoff {
                debug!(path = %path.display(), "Pruning expired backup");
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), ?e, "Failed to prune backup");
                }
            }
        }
        Ok(())
    }

    /// Backup directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn checksum_path(backup: &Path) -> PathBuf {
    let mut name = backup.as_os_str().to_os_string();
    name.push(".sha256");
    PathBuf::from(name)
}

fn sha256_hex(path: &Path) -> PersistenceResult<String> {
    let body = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&body);
    Ok(hex::encode(hasher.finalize()))
}
