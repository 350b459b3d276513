// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background worker for periodic session snapshots.
//!
//! Every `interval` the worker writes the session cache to disk. Failures are
//! logged and retried on the next tick. On shutdown it writes one final
//! snapshot before exiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info};

use super::SessionStore;

/// Background worker that snapshots the session cache.
pub struct BackupWorker {
    store: Arc<SessionStore>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl BackupWorker {
    /// Create a new backup worker.
    pub fn new(store: Arc<SessionStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the backup loop until the shutdown signal is received.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            path = %self.store.files().canonical_path().display(),
            "Session backup worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Session backup worker received shutdown signal");
                    self.backup_once().await;
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {
                    self.backup_once().await;
                }
            }
        }

        info!("Session backup worker stopped");
    }

    async fn backup_once(&self) {
        match self.store.backup().await {
            Ok(count) => debug!(sessions = count, "Session backup complete"),
            Err(e) => error!(error = %e, "Failed to backup sessions"),
        }
    }
}
