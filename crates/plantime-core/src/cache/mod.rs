// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory session cache with crash-consistent file snapshots.
//!
//! [`SessionStore`] keeps at most one [`Session`] per user. All reads and
//! writes go through one async mutex, so every change to a user's session is
//! linearized. [`SessionStore::modify`] hands a transaction function the
//! current session and applies the tagged [`Transaction`] it returns; the
//! function may await storage calls while the lock is held.
//!
//! # Transactions
//!
//! | Result | Map effect | Caller sees |
//! |--------|------------|-------------|
//! | `Keep(session, v)` | store `session` | `Ok(v)` |
//! | `Delete(v)` | remove entry | `Ok(v)` |
//! | `Reject { mutation, error }` | apply `mutation`, if any | `Err(error)` |
//!
//! A rejection carrying a mutation lets a failed flush keep the session it
//! could not persist while still surfacing the failure.

pub mod backup;
pub mod lock;
pub mod worker;

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, TrackingError};
use crate::model::{Session, UserId};

pub use backup::SnapshotFiles;
pub use lock::{BackupLock, BackupLockGuard};
pub use worker::BackupWorker;

/// Change applied to the map alongside a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Store the session.
    Keep(Session),
    /// Remove the user's entry.
    Delete,
}

/// Outcome of a transaction function passed to [`SessionStore::modify`].
#[derive(Debug)]
pub enum Transaction<T> {
    /// Store the session and return the value.
    Keep(Session, T),
    /// Remove the user's entry and return the value.
    Delete(T),
    /// Apply the optional mutation, then fail with `error`.
    Reject {
        /// Map change to apply before failing.
        mutation: Option<Mutation>,
        /// Error returned to the caller.
        error: TrackingError,
    },
}

impl<T> Transaction<T> {
    /// Reject without touching the map.
    pub fn reject(error: TrackingError) -> Self {
        Transaction::Reject {
            mutation: None,
            error,
        }
    }
}

/// Single-slot-per-user session cache.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
    files: SnapshotFiles,
    lock: BackupLock,
}

impl SessionStore {
    /// Empty store snapshotting into `backup_dir`.
    pub fn new(backup_dir: &Path, lock_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            files: SnapshotFiles::new(backup_dir),
            lock: BackupLock::new(backup_dir, lock_timeout),
        }
    }

    /// Snapshot files used by this store.
    pub fn files(&self) -> &SnapshotFiles {
        &self.files
    }

    /// Store `session`, replacing any session of the same user.
    pub async fn upsert(&self, session: Session) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.user_id, session);
    }

    /// Atomically read and rewrite the user's session.
    ///
    /// `f` receives a copy of the current session (or `None`) and its
    /// transaction is applied before the lock is released.
    pub async fn modify<T, F, Fut>(&self, user_id: UserId, f: F) -> Result<T>
    where
        F: FnOnce(Option<Session>) -> Fut,
        Fut: Future<Output = Transaction<T>>,
    {
        let mut sessions = self.sessions.lock().await;
        let current = sessions.get(&user_id).cloned();

        match f(current).await {
            Transaction::Keep(session, value) => {
                sessions.insert(user_id, session);
                Ok(value)
            }
            Transaction::Delete(value) => {
                sessions.remove(&user_id);
                Ok(value)
            }
            Transaction::Reject { mutation, error } => {
                match mutation {
                    Some(Mutation::Keep(session)) => {
                        sessions.insert(user_id, session);
                    }
                    Some(Mutation::Delete) => {
                        sessions.remove(&user_id);
                    }
                    None => {}
                }
                Err(error)
            }
        }
    }

    /// Copy of the user's session.
    pub async fn get(&self, user_id: UserId) -> Option<Session> {
        self.sessions.lock().await.get(&user_id).cloned()
    }

    /// Number of active sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no user has an active session.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// All sessions ordered by user, with `user_id` taken from the map key.
    pub async fn snapshot(&self) -> Vec<Session> {
        let sessions = self.sessions.lock().await;
        let mut list: Vec<Session> = sessions
            .iter()
            .map(|(user_id, session)| Session {
                user_id: *user_id,
                ..session.clone()
            })
            .collect();
        list.sort_by_key(|session| session.user_id);
        list
    }

    /// Write the current sessions to disk under the exclusive advisory lock.
    ///
    /// Writers in other processes sharing the directory wait for the temp
    /// file to be renamed. The map lock is held only while copying the
    /// sessions.
    pub async fn backup(&self) -> Result<usize> {
        let _guard = self.lock.exclusive().await?;
        let sessions = self.snapshot().await;
        let count = sessions.len();

        let files = self.files.clone();
        tokio::task::spawn_blocking(move || files.write(&sessions))
            .await
            .map_err(|e| TrackingError::Io(std::io::Error::other(e)))??;

        debug!(sessions = count, "Backed up in-memory sessions");
        Ok(count)
    }

    /// Load the latest snapshot into the map under the shared advisory lock.
    ///
    /// Restored sessions replace in-memory sessions of the same users.
    pub async fn restore(&self) -> Result<usize> {
        let _guard = self.lock.shared().await?;

        let files = self.files.clone();
        let restored = tokio::task::spawn_blocking(move || files.read())
            .await
            .map_err(|e| TrackingError::Io(std::io::Error::other(e)))??;

        let count = restored.len();
        let mut sessions = self.sessions.lock().await;
        for session in restored {
            sessions.insert(session.user_id, session);
        }
        Ok(count)
    }
}
