// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for plantime-core.
//!
//! The session cache only holds the interval currently being timed. Everything
//! else (plannings, estimations and recorded intervals) lives behind
//! [`PlanningStorage`].

pub mod sqlite;

pub use self::sqlite::SqlitePlanningStorage;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    ExtendedPlanning, NewPlanning, PlannedTime, Planning, PlanningId, PlanningReport,
    SpentTimeHistory, UserId,
};

/// Durable storage for plannings and their spent time.
///
/// Implementations report unknown plannings as
/// [`TrackingError::InvalidPlanning`](crate::error::TrackingError::InvalidPlanning),
/// plannings owned by someone else as `InvalidOwner` and repeated closes as
/// `PlanningClosed`. Any other failure is a `Storage` error.
#[async_trait]
pub trait PlanningStorage: Send + Sync {
    /// Insert an open planning together with its initial estimation.
    async fn create_planning(&self, planning: NewPlanning) -> Result<PlanningId>;

    /// Load a planning, `None` if it does not exist.
    async fn planning(&self, id: PlanningId) -> Result<Option<Planning>>;

    /// Creation time of a planning.
    async fn planning_created_at(&self, id: PlanningId) -> Result<i64>;

    /// Append an interval and add its time to the planning's totals.
    async fn add_spent_time(&self, history: SpentTimeHistory) -> Result<()>;

    /// End of the user's most recent interval, 0 if there is none.
    async fn last_activity(&self, user_id: UserId) -> Result<i64>;

    /// Total seconds spent on the user's plannings created within
    /// `[from, to]`.
    async fn spent_time_in_range(&self, user_id: UserId, from: i64, to: i64) -> Result<i64>;

    /// Close a planning, recomputing its totals from the recorded intervals.
    async fn close_planning(&self, user_id: UserId, report: PlanningReport) -> Result<()>;

    /// The user's open plannings with their latest estimation and activity.
    ///
    /// `outdated` is always `false` here; the service evaluates staleness.
    async fn opened_plannings(&self, user_id: UserId) -> Result<Vec<ExtendedPlanning>>;

    /// Record a new estimation for a planning owned by `user_id`.
    async fn add_extra_time(&self, user_id: UserId, planned: PlannedTime) -> Result<()>;
}
