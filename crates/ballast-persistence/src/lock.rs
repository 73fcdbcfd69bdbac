//! Cross-process advisory file lock.
//!
//! Guards all state mutation against a concurrent process (dashboard vs.
//! scheduler). The lock file's mere existence does not imply held-ness;
//! only the OS lock primitive decides. Within a process, callers are
//! expected to serialize their own calls; this protects cross-process
//! races only.

use crate::error::{PersistenceError, PersistenceResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Poll interval while waiting for the lock.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Cross-process mutual exclusion over a lock file.
#[derive(Debug, Clone)]
pub struct StateLock {
    path: PathBuf,
    timeout: Duration,
}

/// Guard for the held lock. Releases on drop, on every exit path.
#[derive(Debug)]
pub struct StateLockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for StateLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), ?e, "Failed to unlock state lock");
        } else {
            info!(path = %self.path.display(), "State lock released");
        }
    }
}

impl StateLock {
    /// Create a lock manager for `path` with the given acquisition
    /// timeout. The parent directory is created eagerly.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> PersistenceResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "State lock initialized");
        Ok(Self { path, timeout })
    }

    /// Acquire the lock, waiting up to the configured timeout.
    ///
    /// Timeout surfaces as the distinguished
    /// [`PersistenceError::LockTimeout`], never a generic error.
    pub async fn acquire(&self) -> PersistenceResult<StateLockGuard> {
        info!(path = %self.path.display(), "Attempting to acquire state lock");
        let start = Instant::now();

        loop {
            let file = self.open()?;
            match file.try_lock_exclusive() {
                Ok(()) => {
                    info!(path = %self.path.display(), "State lock acquired");
                    return Ok(StateLockGuard {
                        file,
                        path: self.path.clone(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= self.timeout {
                        warn!(
                            path = %self.path.display(),
                            waited_secs = self.timeout.as_secs(),
                            "State lock acquisition timed out"
                        );
                        return Err(PersistenceError::LockTimeout {
                            waited_secs: self.timeout.as_secs(),
                        });
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best-effort probe: is the lock currently held by any process?
    ///
    /// Racy by design; the answer can be stale the moment it returns.
    pub fn is_locked(&self) -> bool {
        let Ok(file) = self.open() else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = file.unlock();
                false
            }
            Err(_) => true,
        }
    }

    /// Administrative cleanup after a crash: removes the lock file.
    ///
    /// Bypasses normal discipline; never call during normal operation.
    pub fn force_release(&self) -> PersistenceResult<()> {
        if self.path.exists() {
            warn!(path = %self.path.display(), "Force-releasing state lock (administrative action)");
            std::fs::remove_file(&self.path)?;
        } else {
            info!("Lock file not present, nothing to release");
        }
        Ok(())
    }

    fn open(&self) -> PersistenceResult<File> {
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)?)
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock(dir: &TempDir, timeout_ms: u64) -> StateLock {
        StateLock::new(
            dir.path().join("ballast.lock"),
            Duration::from_millis(timeout_ms),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let state_lock = lock(&dir, 1000);

        let guard = state_lock.acquire().await.unwrap();
        assert!(state_lock.is_locked());
        drop(guard);
        assert!(!state_lock.is_locked());
    }

    #[tokio::test]
    async fn test_second_acquire_times_out_while_held() {
        let dir = TempDir::new().unwrap();
        let first = lock(&dir, 300);
        let second = lock(&dir, 300);

        let _guard = first.acquire().await.unwrap();
        let err = second.acquire().await.unwrap_err();
        assert!(matches!(err, PersistenceError::LockTimeout { .. }));
    }

    #[tokio::test]
    async fn test_acquire_succeeds_after_release() {
        let dir = TempDir::new().unwrap();
        let state_lock = lock(&dir, 1000);

        {
            let _guard = state_lock.acquire().await.unwrap();
        }
        // Guard dropped; the lock must be free again.
        let _guard = state_lock.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_force_release_removes_stale_lock_file() {
        let dir = TempDir::new().unwrap();
        let state_lock = lock(&dir, 1000);

        // Nothing to release: a no-op, not an error.
        state_lock.force_release().unwrap();

        // A lock file left behind by a crashed process.
        std::fs::write(state_lock.path(), b"").unwrap();
        assert!(state_lock.path().exists());

        state_lock.force_release().unwrap();
        assert!(!state_lock.path().exists());

        // Normal operation resumes after the cleanup.
        let _guard = state_lock.acquire().await.unwrap();
        assert!(state_lock.path().exists());
    }

    #[tokio::test]
    async fn test_no_overlapping_locked_intervals() {
        let dir = TempDir::new().unwrap();
        let state_lock = lock(&dir, 2000);
        let guard = state_lock.acquire().await.unwrap();

        let contender = lock(&dir, 2000);
        let handle = tokio::spawn(async move {
            let _guard = contender.acquire().await.unwrap();
            Instant::now()
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        let released_at = Instant::now();
        drop(guard);

        let acquired_at = handle.await.unwrap();
        assert!(acquired_at >= released_at);
    }
}
