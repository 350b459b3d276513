// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for plantime-core.
//!
//! Provides a unified error type that maps to the error codes reported by the
//! RPC layer sitting in front of the tracking service.

use thiserror::Error;

use crate::model::PlanningId;

/// Result type using TrackingError
pub type Result<T> = std::result::Result<T, TrackingError>;

/// JSON-RPC code used for errors that are surfaced to clients as opaque failures.
pub const INTERNAL_RPC_CODE: i64 = -32603;

/// Errors that can occur while tracking spent time.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackingError {
    /// The user has no active planning in the session cache.
    #[error("No active planning for user")]
    NoActiveSession,

    /// The planning is unknown or does not match the active session.
    #[error("Invalid planning '{0}'")]
    InvalidPlanning(PlanningId),

    /// The planning belongs to another user.
    #[error("Planning '{0}' belongs to another user")]
    InvalidOwner(PlanningId),

    /// The report (or activation) is older than already recorded activity.
    #[error("Report is older than the last recorded activity")]
    OutdatedReport,

    /// The report claims a negative amount of spent time.
    #[error("Spent time must not be negative, got {0}")]
    NegativeSpentTime(i64),

    /// The planning exceeded its lifetime or has been silent for too long.
    #[error("Planning '{0}' is outdated")]
    PlanningOutdated(PlanningId),

    /// The planning is already closed.
    #[error("Planning '{0}' is already closed")]
    PlanningClosed(PlanningId),

    /// The shared backup lock could not be obtained in time.
    #[error("Maintenance in progress: {0}")]
    Maintenance(String),

    /// A storage call did not complete before its deadline.
    #[error("Timed out during '{operation}'")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// The wall clock is behind the session's recorded timestamps.
    #[error(
        "Clock went backwards: now {now}, session started {started_at}, last checkpoint {last_checkpoint}"
    )]
    ClockSkew {
        /// Wall clock at evaluation time.
        now: i64,
        /// Session start.
        started_at: i64,
        /// Session's last accepted checkpoint.
        last_checkpoint: i64,
    },

    /// Storage operation failed.
    #[error("Storage error during '{operation}': {details}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Reading or writing a snapshot file failed.
    #[error("Snapshot I/O error on {path}: {source}")]
    Snapshot {
        /// File the operation was working on.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackingError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "NO_ACTIVE_PLANNING",
            Self::InvalidPlanning(_) => "INVALID_PLANNING_ID",
            Self::InvalidOwner(_) => "INVALID_USER_ID",
            Self::OutdatedReport => "OUTDATED_REPORT",
            Self::NegativeSpentTime(_) => "NEGATIVE_SPENT_TIME",
            Self::PlanningOutdated(_) => "PLANNING_OUTDATED",
            Self::PlanningClosed(_) => "PLANNING_CLOSED",
            Self::Maintenance(_) => "MAINTENANCE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ClockSkew { .. }
            | Self::Storage { .. }
            | Self::Snapshot { .. }
            | Self::Io(_)
            | Self::Json(_) => "INTERNAL",
        }
    }

    /// Numeric JSON-RPC code reported to clients.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::Timeout { .. } => 0,
            Self::Maintenance(_) => 4,
            Self::InvalidPlanning(_) => 100,
            Self::NoActiveSession => 101,
            Self::InvalidOwner(_) => 102,
            Self::PlanningClosed(_) => 103,
            Self::PlanningOutdated(_) => 104,
            Self::OutdatedReport => 105,
            Self::NegativeSpentTime(_) => 106,
            _ => INTERNAL_RPC_CODE,
        }
    }

    /// Whether the error is an unclassified internal failure that clients
    /// should only see as an opaque error.
    pub fn is_internal(&self) -> bool {
        self.rpc_code() == INTERNAL_RPC_CODE
    }

    /// Prefix a storage failure with the operation that issued it.
    ///
    /// Typed errors keep their kind untouched.
    pub fn with_operation(self, operation: &str) -> Self {
        match self {
            Self::Storage {
                operation: inner,
                details,
            } if inner != operation => Self::Storage {
                operation: format!("{}: {}", operation, inner),
                details,
            },
            other => other,
        }
    }
}

impl From<sqlx::Error> for TrackingError {
    fn from(err: sqlx::Error) -> Self {
        TrackingError::Storage {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for TrackingError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        TrackingError::Storage {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}
