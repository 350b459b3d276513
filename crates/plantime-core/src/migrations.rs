// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded schema for the planning store.
//!
//! Three tables: `plannings` (one row per planning with its running totals),
//! `planned_times` (estimation changes, newest wins) and `spent_time_history`
//! (online and offline intervals). Hosts that own their pool call
//! [`run_sqlite`] once at startup; [`SqlitePlanningStorage::connect`] does it
//! for them.
//!
//! ```ignore
//! let pool = sqlx::SqlitePool::connect("sqlite://plantime.db").await?;
//! plantime_core::migrations::run_sqlite(&pool).await?;
//! ```
//!
//! [`SqlitePlanningStorage::connect`]: crate::persistence::SqlitePlanningStorage::connect

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;

use crate::error::Result;

/// Migrator for the SQLite schema.
pub static SQLITE: Migrator = sqlx::migrate!("./migrations/sqlite");

/// Bring the schema at `pool` up to date. Applied migrations are skipped.
pub async fn run_sqlite(pool: &SqlitePool) -> Result<()> {
    SQLITE.run(pool).await?;
    Ok(())
}
