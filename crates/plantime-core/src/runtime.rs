// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for plantime-core.
//!
//! This module provides [`TrackerRuntime`] which wires the session cache, the
//! backup worker and the [`PlanningService`] together inside an existing tokio
//! application.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use plantime_core::config::Config;
//! use plantime_core::persistence::SqlitePlanningStorage;
//! use plantime_core::runtime::TrackerRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqlitePlanningStorage::connect(&config.database_url).await?);
//!
//!     let runtime = TrackerRuntime::builder()
//!         .storage(storage)
//!         .config(config)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... serve requests through runtime.service() ...
//!
//!     // Graceful shutdown, writes a final snapshot
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::{BackupWorker, SessionStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::persistence::PlanningStorage;
use crate::service::PlanningService;

/// Builder for creating a [`TrackerRuntime`].
#[derive(Default)]
pub struct TrackerRuntimeBuilder {
    storage: Option<Arc<dyn PlanningStorage>>,
    config: Option<Config>,
    clock: Option<Arc<dyn Clock>>,
}

impl std::fmt::Debug for TrackerRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerRuntimeBuilder")
            .field("storage", &self.storage.as_ref().map(|_| "..."))
            .field("config", &self.config)
            .field("clock", &self.clock.as_ref().map(|_| "..."))
            .finish()
    }
}

impl TrackerRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the planning storage (required).
    pub fn storage(mut self, storage: Arc<dyn PlanningStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the configuration (required).
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the clock.
    ///
    /// Default: [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<TrackerRuntimeConfig> {
        let storage = self
            .storage
            .ok_or_else(|| anyhow::anyhow!("storage is required"))?;
        let config = self
            .config
            .ok_or_else(|| anyhow::anyhow!("config is required"))?;

        Ok(TrackerRuntimeConfig {
            storage,
            config,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

/// Configuration for a [`TrackerRuntime`].
pub struct TrackerRuntimeConfig {
    storage: Arc<dyn PlanningStorage>,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TrackerRuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerRuntimeConfig")
            .field("storage", &"...")
            .field("config", &self.config)
            .finish()
    }
}

impl TrackerRuntimeConfig {
    /// Restore the session cache and spawn the backup worker.
    ///
    /// A failed restore is logged and the runtime starts with an empty cache.
    pub async fn start(self) -> Result<TrackerRuntime> {
        let config = self.config;
        let store = Arc::new(SessionStore::new(&config.backup_dir, config.lock_timeout));

        match store.restore().await {
            Ok(count) => info!(sessions = count, "Session cache restored"),
            Err(e) => warn!(error = %e, "Failed to restore session cache, starting empty"),
        }

        let worker = BackupWorker::new(store.clone(), config.backup_interval);
        let shutdown = worker.shutdown_handle();
        let worker_handle = tokio::spawn(async move { worker.run().await });

        let service = Arc::new(PlanningService::new(
            store,
            self.storage,
            self.clock,
            config.limits,
            config.storage_timeout,
        ));

        info!(backup_dir = %config.backup_dir.display(), "TrackerRuntime started");

        Ok(TrackerRuntime {
            worker_handle,
            shutdown,
            service,
        })
    }
}

/// A running tracker that can be embedded in an application.
///
/// The runtime manages:
/// - the in-memory session cache, restored from the last snapshot
/// - the backup worker that snapshots it periodically
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct TrackerRuntime {
    worker_handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
    service: Arc<PlanningService>,
}

impl TrackerRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> TrackerRuntimeBuilder {
        TrackerRuntimeBuilder::new()
    }

    /// Get a reference to the planning service.
    pub fn service(&self) -> &Arc<PlanningService> {
        &self.service
    }

    /// Gracefully shut down the runtime.
    ///
    /// Signals the backup worker, which writes a final snapshot, and waits
    /// for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        info!("TrackerRuntime shutting down...");

        self.shutdown.notify_one();

        match self.worker_handle.await {
            Ok(()) => {
                info!("TrackerRuntime shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Backup worker task panicked: {}", e);
                Err(anyhow::anyhow!("backup worker task panicked: {}", e))
            }
        }
    }

    /// Check if the backup worker is still running.
    pub fn is_running(&self) -> bool {
        !self.worker_handle.is_finished()
    }
}
