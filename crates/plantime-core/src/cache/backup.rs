// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session snapshot files.
//!
//! A snapshot is a JSON array of [`Session`] records written to
//! `backup.json.tmp`, flushed to disk and renamed over `backup.json`. A crash
//! mid-write leaves either the previous canonical file or a complete temp
//! file, so restore tries the canonical file first and the temp file second.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, TrackingError};
use crate::model::Session;

/// Canonical snapshot file name.
pub const BACKUP_FILE_NAME: &str = "backup.json";

/// Temp file written before the rename.
pub const TEMP_BACKUP_FILE_NAME: &str = "backup.json.tmp";

/// Snapshot files inside one backup directory.
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    dir: PathBuf,
}

impl SnapshotFiles {
    /// Snapshot files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of `backup.json`.
    pub fn canonical_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE_NAME)
    }

    /// Path of `backup.json.tmp`.
    pub fn temp_path(&self) -> PathBuf {
        self.dir.join(TEMP_BACKUP_FILE_NAME)
    }

    /// Write `sessions` as the new canonical snapshot.
    pub fn write(&self, sessions: &[Session]) -> Result<()> {
        let bytes = serde_json::to_vec(sessions)?;

        fs::create_dir_all(&self.dir).map_err(|e| snapshot_error(&self.dir, e))?;

        let tmp_path = self.temp_path();
        let mut tmp_file = File::create(&tmp_path).map_err(|e| snapshot_error(&tmp_path, e))?;
        tmp_file
            .write_all(&bytes)
            .and_then(|()| tmp_file.sync_all())
            .map_err(|e| snapshot_error(&tmp_path, e))?;
        drop(tmp_file);

        let path = self.canonical_path();
        fs::rename(&tmp_path, &path).map_err(|e| snapshot_error(&path, e))?;
        Ok(())
    }

    /// Read the latest snapshot.
    ///
    /// Falls back to the temp file when the canonical file is unreadable.
    /// Returns an error only when neither file can be read; a readable file
    /// that fails to parse is an error as well.
    pub fn read(&self) -> Result<Vec<Session>> {
        let path = self.canonical_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => {
                info!(path = %path.display(), "Restoring sessions from snapshot");
                bytes
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read snapshot");
                let tmp_path = self.temp_path();
                let bytes = fs::read(&tmp_path).map_err(|e| {
                    warn!(path = %tmp_path.display(), error = %e, "Failed to read temp snapshot");
                    snapshot_error(&tmp_path, e)
                })?;
                info!(path = %tmp_path.display(), "Restoring sessions from temp snapshot");
                bytes
            }
        };

        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn snapshot_error(path: &Path, source: io::Error) -> TrackingError {
    TrackingError::Snapshot {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlanningId, UserId};
    use tempfile::TempDir;

    fn sessions() -> Vec<Session> {
        vec![
            Session::new(UserId(1), PlanningId(10), 100, 200),
            Session {
                spent_seconds: 42,
                last_checkpoint: 260,
                ..Session::new(UserId(2), PlanningId(20), 150, 210)
            },
        ]
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let files = SnapshotFiles::new(dir.path());

        files.write(&sessions()).unwrap();

        assert!(files.canonical_path().exists());
        assert!(!files.temp_path().exists());
        assert_eq!(files.read().unwrap(), sessions());
    }

    #[test]
    fn test_read_falls_back_to_temp_file() {
        let dir = TempDir::new().unwrap();
        let files = SnapshotFiles::new(dir.path());

        fs::write(files.temp_path(), serde_json::to_vec(&sessions()).unwrap()).unwrap();

        assert_eq!(files.read().unwrap(), sessions());
    }

    #[test]
    fn test_canonical_file_wins_over_temp_file() {
        let dir = TempDir::new().unwrap();
        let files = SnapshotFiles::new(dir.path());

        files.write(&sessions()[..1]).unwrap();
        fs::write(files.temp_path(), serde_json::to_vec(&sessions()).unwrap()).unwrap();

        assert_eq!(files.read().unwrap().len(), 1);
    }

    #[test]
    fn test_read_without_files_fails() {
        let dir = TempDir::new().unwrap();
        let files = SnapshotFiles::new(dir.path());

        let err = files.read().unwrap_err();
        assert!(matches!(err, TrackingError::Snapshot { .. }));
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let files = SnapshotFiles::new(dir.path());
        fs::write(files.canonical_path(), b"[{\"user_id\":").unwrap();

        assert!(matches!(files.read(), Err(TrackingError::Json(_))));
    }

    #[test]
    fn test_empty_map_writes_empty_array() {
        let dir = TempDir::new().unwrap();
        let files = SnapshotFiles::new(dir.path());

        files.write(&[]).unwrap();

        assert_eq!(fs::read_to_string(files.canonical_path()).unwrap(), "[]");
    }
}
