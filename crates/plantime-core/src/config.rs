// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::reconcile::Limits;

/// Plantime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL
    pub database_url: String,
    /// Directory holding `backup.json` and its temp sibling
    pub backup_dir: PathBuf,
    /// Interval between session snapshots
    pub backup_interval: Duration,
    /// Maximum wait for the advisory backup lock
    pub lock_timeout: Duration,
    /// Staleness limits applied to progress reports
    pub limits: Limits,
    /// Deadline for every storage call
    pub storage_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `PLANTIME_DATABASE_URL`: SQLite connection string
    /// - `PLANTIME_BACKUP_DIR`: directory for session snapshots
    ///
    /// Optional (with defaults):
    /// - `PLANTIME_BACKUP_INTERVAL_SECS`: snapshot period (default: 60)
    /// - `PLANTIME_LOCK_TIMEOUT_MS`: advisory lock wait (default: 5000)
    /// - `PLANTIME_MAX_PLANNING_AGE_SECS`: planning lifetime (default: 86400)
    /// - `PLANTIME_MAX_SINCE_LAST_UPDATE_SECS`: allowed silence (default: 3600)
    /// - `PLANTIME_STORAGE_TIMEOUT_MS`: storage call deadline (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("PLANTIME_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("PLANTIME_DATABASE_URL"))?;

        let backup_dir = std::env::var("PLANTIME_BACKUP_DIR")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::Missing("PLANTIME_BACKUP_DIR"))?;

        let backup_interval = Duration::from_secs(parse_u64(
            "PLANTIME_BACKUP_INTERVAL_SECS",
            60,
            "must be a positive number of seconds",
        )?);
        if backup_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "PLANTIME_BACKUP_INTERVAL_SECS",
                "must be a positive number of seconds",
            ));
        }

        let lock_timeout = Duration::from_millis(parse_u64(
            "PLANTIME_LOCK_TIMEOUT_MS",
            5000,
            "must be a number of milliseconds",
        )?);

        let max_planning_age = parse_limit("PLANTIME_MAX_PLANNING_AGE_SECS", 86_400)?;
        let max_since_last_update = parse_limit("PLANTIME_MAX_SINCE_LAST_UPDATE_SECS", 3_600)?;

        let storage_timeout = Duration::from_millis(parse_u64(
            "PLANTIME_STORAGE_TIMEOUT_MS",
            10_000,
            "must be a number of milliseconds",
        )?);

        Ok(Self {
            database_url,
            backup_dir,
            backup_interval,
            lock_timeout,
            limits: Limits {
                max_planning_age,
                max_since_last_update,
            },
            storage_timeout,
        })
    }

    /// Configuration suitable for tests and embedding: defaults for every
    /// tunable, with the given database and backup location.
    pub fn new(database_url: impl Into<String>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: database_url.into(),
            backup_dir: backup_dir.into(),
            backup_interval: Duration::from_secs(60),
            lock_timeout: Duration::from_millis(5000),
            limits: Limits::default(),
            storage_timeout: Duration::from_millis(10_000),
        }
    }
}

fn parse_u64(key: &'static str, default: u64, reason: &'static str) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, reason)),
        Err(_) => Ok(default),
    }
}

/// Staleness limits are compared against unix-second differences, so they
/// must fit a non-negative `i64`.
fn parse_limit(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    const REASON: &str = "must be a non-negative number of seconds";
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|limit| *limit >= 0)
            .ok_or(ConfigError::Invalid(key, REASON)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
