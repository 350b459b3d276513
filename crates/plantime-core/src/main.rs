// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plantime Core - Active Planning Time Tracking
//!
//! Runs the tracker standalone: restores the session cache, keeps it backed up
//! and writes a final snapshot on Ctrl-C. The RPC transport embeds the library
//! through [`TrackerRuntime`] instead.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use plantime_core::config::Config;
use plantime_core::persistence::SqlitePlanningStorage;
use plantime_core::runtime::TrackerRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plantime_core=info".parse()?),
        )
        .init();

    info!("Starting Plantime Core");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        backup_dir = %config.backup_dir.display(),
        backup_interval_secs = config.backup_interval.as_secs(),
        max_planning_age = config.limits.max_planning_age,
        max_since_last_update = config.limits.max_since_last_update,
        "Configuration loaded"
    );

    // Connect to database
    info!("Connecting to database...");
    let storage = SqlitePlanningStorage::connect(&config.database_url).await?;
    let row: (i64,) = sqlx::query_as("SELECT 1")
        .fetch_one(storage.pool())
        .await?;
    info!(result = row.0, "Database health check passed");

    let pool = storage.pool().clone();
    let runtime = TrackerRuntime::builder()
        .storage(Arc::new(storage))
        .config(config)
        .build()?
        .start()
        .await?;

    info!("Plantime Core initialized successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    runtime.shutdown().await?;

    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}
