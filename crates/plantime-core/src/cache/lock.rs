// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Advisory file lock guarding snapshot reads and writes.
//!
//! Restores take the lock in shared mode, so several processes can read the
//! snapshot at once. Backups and external maintenance tooling (migrations,
//! file moves) take it exclusively, so only one writer ever touches the temp
//! file. Acquisition polls until a deadline and then reports
//! [`TrackingError::Maintenance`].

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Result, TrackingError};

/// Name of the lock file inside the backup directory.
pub const LOCK_FILE_NAME: &str = ".lock";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Advisory lock on `<backup_dir>/.lock`.
#[derive(Debug, Clone)]
pub struct BackupLock {
    path: PathBuf,
    timeout: Duration,
}

impl BackupLock {
    /// Lock on the lock file inside `backup_dir`, waiting at most `timeout`.
    pub fn new(backup_dir: &Path, timeout: Duration) -> Self {
        Self {
            path: backup_dir.join(LOCK_FILE_NAME),
            timeout,
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock in shared mode.
    pub async fn shared(&self) -> Result<BackupLockGuard> {
        self.acquire(|file| FileExt::try_lock_shared(file)).await
    }

    /// Take the lock exclusively, shutting out readers and other writers.
    pub async fn exclusive(&self) -> Result<BackupLockGuard> {
        self.acquire(|file| FileExt::try_lock_exclusive(file)).await
    }

    async fn acquire<F>(&self, try_lock: F) -> Result<BackupLockGuard>
    where
        F: Fn(&File) -> io::Result<()>,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match try_lock(&file) {
                Ok(()) => {
                    debug!(path = %self.path.display(), "Backup lock acquired");
                    return Ok(BackupLockGuard { file });
                }
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        return Err(TrackingError::Maintenance(format!(
                            "can't obtain lock {} within {}ms",
                            self.path.display(),
                            self.timeout.as_millis()
                        )));
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Held advisory lock; released on drop.
#[derive(Debug)]
pub struct BackupLockGuard {
    file: File,
}

impl Drop for BackupLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let lock = BackupLock::new(dir.path(), Duration::from_millis(100));

        let first = lock.shared().await.unwrap();
        let second = lock.shared().await.unwrap();
        assert!(lock.path().exists());

        drop(first);
        drop(second);
    }

    #[tokio::test]
    async fn test_exclusive_lock_blocks_shared() {
        let dir = TempDir::new().unwrap();
        let lock = BackupLock::new(dir.path(), Duration::from_millis(120));

        let held = lock.exclusive().await.unwrap();
        let err = lock.shared().await.unwrap_err();
        assert!(matches!(err, TrackingError::Maintenance(_)));
        assert_eq!(err.error_code(), "MAINTENANCE");

        drop(held);
        assert!(lock.shared().await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let lock = BackupLock::new(dir.path(), Duration::from_secs(5));

        let held = lock.exclusive().await.unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(held);
        });

        assert!(lock.shared().await.is_ok());
        release.await.unwrap();
    }

    #[tokio::test]
    async fn test_creates_missing_backup_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let lock = BackupLock::new(&nested, Duration::from_millis(100));

        let _guard = lock.shared().await.unwrap();
        assert!(nested.join(LOCK_FILE_NAME).exists());
    }
}
