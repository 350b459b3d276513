// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plantime Core - Active Planning Time Tracking
//!
//! This crate tracks, per user, the single planning currently being timed. Clients
//! send periodic progress reports; the core reconciles them against the active
//! session and classifies elapsed time as online (continuously observed) or
//! offline (a gap, recorded as its own interval).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RPC transport (external)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           PlanningService                                │
//! │          set_active / add_spent_time / close_planning / spent_time       │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                         │                         │
//!           ▼                         ▼                         ▼
//! ┌───────────────────┐   ┌───────────────────────┐   ┌───────────────────┐
//! │   SessionStore    │   │      reconcile        │   │  PlanningStorage  │
//! │  one slot / user  │   │  pure decision logic  │   │     (SQLite)      │
//! └───────────────────┘   └───────────────────────┘   └───────────────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │   BackupWorker    │  backup.json.tmp ──rename──▶ backup.json
//! └───────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `set_active` | Flush any current session, then start a new one |
//! | `add_spent_time` | Validate a report and credit it online or offline |
//! | `close_planning` | Flush the session if it times this planning, then close it |
//! | `spent_time` | Stored total for a range plus the active session |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PLANTIME_DATABASE_URL` | Yes | - | SQLite connection string |
//! | `PLANTIME_BACKUP_DIR` | Yes | - | Directory for session snapshots |
//! | `PLANTIME_BACKUP_INTERVAL_SECS` | No | `60` | Snapshot period |
//! | `PLANTIME_LOCK_TIMEOUT_MS` | No | `5000` | Advisory lock wait |
//! | `PLANTIME_MAX_PLANNING_AGE_SECS` | No | `86400` | Planning lifetime |
//! | `PLANTIME_MAX_SINCE_LAST_UPDATE_SECS` | No | `3600` | Allowed silence between reports |
//! | `PLANTIME_STORAGE_TIMEOUT_MS` | No | `10000` | Storage call deadline |

#![warn(missing_docs)]

/// In-memory session cache with file snapshots.
pub mod cache;

/// Injectable wall clock.
pub mod clock;

/// Configuration loaded from environment variables.
pub mod config;

/// Error types with RPC error code mapping.
pub mod error;

/// Embedded SQLite migrations.
pub mod migrations;

/// Domain records.
pub mod model;

/// Planning storage trait and SQLite backend.
pub mod persistence;

/// Report reconciliation rules.
pub mod reconcile;

/// Embeddable runtime with graceful shutdown.
pub mod runtime;

/// Session lifecycle controller.
pub mod service;

pub use error::{Result, TrackingError};
pub use service::PlanningService;
