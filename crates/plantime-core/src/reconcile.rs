// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reconciliation of client progress reports against the active session.
//!
//! Pure decision logic: given the server time, the current [`Session`] and a
//! [`SpentTimeReport`], decide whether the report is rejected, credited as
//! online time, or split into a separately recorded offline interval.
//!
//! Checks run in a fixed order and the first failing one wins:
//!
//! | # | Condition | Outcome |
//! |---|-----------|---------|
//! | 1 | `now` before the session's start or last checkpoint | `ClockSkew` |
//! | 2 | report planning differs from the session's | `InvalidPlanning` |
//! | 3 | `time` before the last checkpoint | `OutdatedReport` |
//! | 4 | negative `spent` | `NegativeSpentTime` |
//! | 5 | planning too old, or silent for too long | `PlanningOutdated` |
//!
//! Accepted reports have `spent` clamped to the wall time elapsed since the
//! last checkpoint. When the server has not heard from the client for more
//! than [`OFFLINE_THRESHOLD_SECS`], the report becomes an offline interval.

use crate::error::{Result, TrackingError};
use crate::model::{Session, SpentTimeHistory, SpentTimeReport, SpentTimeStatus};

/// Silence after which a report is classified as offline.
pub const OFFLINE_THRESHOLD_SECS: i64 = 300;

/// Staleness limits for plannings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum age of a planning, in seconds since its creation.
    pub max_planning_age: i64,
    /// Maximum silence between two accepted reports, in seconds.
    pub max_since_last_update: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_planning_age: 86_400,
            max_since_last_update: 3_600,
        }
    }
}

impl Limits {
    /// Whether a planning created at `created` and last updated at `last`
    /// is outdated at `time`. A `last` of zero means "never updated".
    pub fn is_outdated(&self, time: i64, created: i64, last: i64) -> bool {
        time - created > self.max_planning_age
            || (last > 0 && time - last > self.max_since_last_update)
    }
}

/// Outcome of an accepted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Report credited as continuously observed time.
    Online {
        /// Report with its spent amount clamped.
        report: SpentTimeReport,
    },
    /// Report covering a gap; `interval` must be persisted before the
    /// session is advanced.
    Offline {
        /// Report with its spent amount clamped.
        report: SpentTimeReport,
    },
}

impl Decision {
    /// Classification of the accepted report.
    pub fn status(&self) -> SpentTimeStatus {
        match self {
            Decision::Online { .. } => SpentTimeStatus::Online,
            Decision::Offline { .. } => SpentTimeStatus::Offline,
        }
    }

    /// The clamped report.
    pub fn report(&self) -> &SpentTimeReport {
        match self {
            Decision::Online { report } | Decision::Offline { report } => report,
        }
    }

    /// Offline interval to persist, if any.
    pub fn offline_interval(&self) -> Option<SpentTimeHistory> {
        match self {
            Decision::Online { .. } => None,
            Decision::Offline { report } => Some(SpentTimeHistory {
                planning_id: report.planning_id,
                spent: report.spent,
                started_at: report.time - report.spent,
                ended_at: report.time,
                status: SpentTimeStatus::Offline,
            }),
        }
    }

    /// Session advanced by the report.
    ///
    /// Offline time is credited to the session as well as recorded as its own
    /// interval, so it is counted again when the session is flushed.
    pub fn apply(&self, session: &Session) -> Session {
        let report = self.report();
        Session {
            last_checkpoint: report.time,
            spent_seconds: session.spent_seconds + report.spent,
            ..session.clone()
        }
    }
}

/// Validate `report` against `session` at server time `now`.
pub fn check_report(
    now: i64,
    session: &Session,
    report: &SpentTimeReport,
    limits: &Limits,
) -> Result<Decision> {
    if now < session.last_checkpoint || now < session.started_at {
        return Err(TrackingError::ClockSkew {
            now,
            started_at: session.started_at,
            last_checkpoint: session.last_checkpoint,
        });
    }
    if report.planning_id != session.planning_id {
        return Err(TrackingError::InvalidPlanning(report.planning_id));
    }
    if report.time < session.last_checkpoint {
        return Err(TrackingError::OutdatedReport);
    }
    if report.spent < 0 {
        return Err(TrackingError::NegativeSpentTime(report.spent));
    }
    if limits.is_outdated(
        report.time,
        session.planning_created_at,
        session.last_checkpoint,
    ) {
        return Err(TrackingError::PlanningOutdated(session.planning_id));
    }

    let mut report = *report;
    report.spent = report.spent.min(report.time - session.last_checkpoint);

    if now - session.last_checkpoint > OFFLINE_THRESHOLD_SECS {
        Ok(Decision::Offline { report })
    } else {
        Ok(Decision::Online { report })
    }
}

/// Online interval covering everything the session has accumulated.
pub fn flush(session: &Session) -> SpentTimeHistory {
    SpentTimeHistory {
        planning_id: session.planning_id,
        spent: session.spent_seconds,
        started_at: session.started_at,
        ended_at: session.last_checkpoint,
        status: SpentTimeStatus::Online,
    }
}
