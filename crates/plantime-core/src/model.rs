// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain records shared by the session cache, the reconciliation engine and
//! the storage layer.
//!
//! All timestamps are unix seconds and all spent amounts are seconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authenticated user identity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a planning (the unit of work being timed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanningId(pub i64);

impl PlanningId {
    /// Interpret a raw wire id, where `0` means "no planning".
    pub fn from_raw(raw: i64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}

impl fmt::Display for PlanningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single active planning a user is currently timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Owner of the session.
    pub user_id: UserId,
    /// Planning being timed.
    pub planning_id: PlanningId,
    /// Creation time of the planning, fetched once when the session starts.
    pub planning_created_at: i64,
    /// When the session began.
    pub started_at: i64,
    /// Time of the last accepted report. Never decreases.
    pub last_checkpoint: i64,
    /// Seconds credited to this session since `started_at`.
    pub spent_seconds: i64,
}

impl Session {
    /// Start a fresh session at `time`.
    pub fn new(
        user_id: UserId,
        planning_id: PlanningId,
        planning_created_at: i64,
        time: i64,
    ) -> Self {
        Self {
            user_id,
            planning_id,
            planning_created_at,
            started_at: time,
            last_checkpoint: time,
            spent_seconds: 0,
        }
    }
}

/// Progress report submitted by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentTimeReport {
    /// Reporting user.
    pub user_id: UserId,
    /// Planning the time was spent on.
    pub planning_id: PlanningId,
    /// Seconds the client claims were spent since its previous report.
    pub spent: i64,
    /// Client time of the report.
    pub time: i64,
}

/// Online/offline classification of a spent time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpentTimeStatus {
    /// Continuously observed time.
    Online,
    /// A gap too large to have been observed, recorded separately.
    Offline,
}

impl SpentTimeStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }
}

impl FromStr for SpentTimeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(Self::Online),
            "OFFLINE" => Ok(Self::Offline),
            other => Err(format!("unknown spent time status '{}'", other)),
        }
    }
}

/// Immutable interval of time attributed to a planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentTimeHistory {
    /// Planning the time belongs to.
    pub planning_id: PlanningId,
    /// Seconds spent.
    pub spent: i64,
    /// Interval start.
    pub started_at: i64,
    /// Interval end.
    pub ended_at: i64,
    /// Online or offline.
    pub status: SpentTimeStatus,
}

/// Request to make a planning the user's active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    /// Requesting user.
    pub user_id: UserId,
    /// Planning to activate; `None` only deactivates the current one.
    pub planning_id: Option<PlanningId>,
    /// Client time of the request.
    pub time: i64,
}

/// Final report sent when a planning is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningReport {
    /// Planning being closed.
    pub planning_id: PlanningId,
    /// Issue progress (percent done) at close time.
    pub progress: i64,
    /// Client time of the report.
    pub time: i64,
}

/// Open or closed planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanningStatus {
    /// Still accepting time.
    Open,
    /// Finalized by `close_planning`.
    Closed,
}

impl PlanningStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

impl FromStr for PlanningStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            other => Err(format!("unknown planning status '{}'", other)),
        }
    }
}

/// A user's plan to work on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planning {
    /// Planning id.
    pub id: PlanningId,
    /// Owner.
    pub user_id: UserId,
    /// Open or closed.
    pub status: PlanningStatus,
    /// Project the issue belongs to.
    pub project_id: i64,
    /// Issue tracker id.
    pub tracker_id: i64,
    /// Issue id within the tracker.
    pub issue_id: i64,
    /// Issue title.
    pub issue_title: String,
    /// Issue URL.
    pub issue_url: String,
    /// Tracker-side estimation of the issue.
    pub issue_estimation: i64,
    /// Issue due date.
    pub issue_due_date: i64,
    /// Issue progress (percent done).
    pub issue_done: i64,
    /// Tracker activity id.
    pub activity_id: i64,
    /// Online seconds persisted for this planning.
    pub spent_online: i64,
    /// Offline seconds persisted for this planning.
    pub spent_offline: i64,
    /// Time of the closing report, 0 while open.
    pub reported: i64,
    /// Creation time.
    pub created_at: i64,
}

/// Input for creating a planning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlanning {
    /// Owner.
    pub user_id: UserId,
    /// Project the issue belongs to.
    pub project_id: i64,
    /// Issue tracker id.
    pub tracker_id: i64,
    /// Issue id within the tracker.
    pub issue_id: i64,
    /// Issue title.
    pub issue_title: String,
    /// Issue URL.
    pub issue_url: String,
    /// Tracker-side estimation of the issue.
    pub issue_estimation: i64,
    /// Issue due date.
    pub issue_due_date: i64,
    /// Issue progress (percent done).
    pub issue_done: i64,
    /// Tracker activity id.
    pub activity_id: i64,
    /// Seconds the user plans to spend.
    pub estimation: i64,
}

/// Planning enriched with its latest estimation and activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedPlanning {
    /// The stored planning.
    #[serde(flatten)]
    pub planning: Planning,
    /// Latest planned time for the planning.
    pub estimation: i64,
    /// End of the latest recorded interval, 0 if none.
    pub last_activity: i64,
    /// Whether the planning can no longer accept reports.
    pub outdated: bool,
}

/// Extra time added to a planning's estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTime {
    /// Planning receiving the estimation.
    pub planning_id: PlanningId,
    /// New estimation in seconds.
    pub estimation: i64,
    /// Why the estimation changed.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_id_from_raw() {
        assert_eq!(PlanningId::from_raw(0), None);
        assert_eq!(PlanningId::from_raw(12), Some(PlanningId(12)));
    }

    #[test]
    fn test_new_session_starts_at_request_time() {
        let session = Session::new(UserId(1), PlanningId(2), 100, 500);
        assert_eq!(session.started_at, 500);
        assert_eq!(session.last_checkpoint, 500);
        assert_eq!(session.spent_seconds, 0);
        assert_eq!(session.planning_created_at, 100);
    }

    #[test]
    fn test_status_round_trips_through_storage_strings() {
        for status in [SpentTimeStatus::Online, SpentTimeStatus::Offline] {
            assert_eq!(status.as_str().parse::<SpentTimeStatus>(), Ok(status));
        }
        for status in [PlanningStatus::Open, PlanningStatus::Closed] {
            assert_eq!(status.as_str().parse::<PlanningStatus>(), Ok(status));
        }
        assert!("paused".parse::<SpentTimeStatus>().is_err());
    }

    #[test]
    fn test_session_json_field_names() {
        let session = Session::new(UserId(9), PlanningId(4), 1, 2);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["user_id"], 9);
        assert_eq!(json["planning_id"], 4);
        assert_eq!(json["last_checkpoint"], 2);
    }
}
