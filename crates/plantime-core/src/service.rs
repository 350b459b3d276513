// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session lifecycle: activation, progress reports, closing and range queries.
//!
//! [`PlanningService`] ties the session cache to planning storage. Every
//! change to a user's session runs inside one [`SessionStore::modify`]
//! transaction, and every storage call is bounded by the configured deadline.
//!
//! # Flush
//!
//! Replacing or closing the active planning first flushes the session: its
//! accumulated time is written as one online interval and the session is
//! dropped. When the write fails the session stays in the cache and the error
//! is returned, so the next attempt can retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::cache::{Mutation, SessionStore, Transaction};
use crate::clock::Clock;
use crate::error::{Result, TrackingError};
use crate::model::{
    ActivationRequest, ExtendedPlanning, NewPlanning, PlannedTime, Planning, PlanningId,
    PlanningReport, Session, SpentTimeReport, SpentTimeStatus, UserId,
};
use crate::persistence::PlanningStorage;
use crate::reconcile::{self, Limits};

/// Session lifecycle controller.
pub struct PlanningService {
    store: Arc<SessionStore>,
    storage: Arc<dyn PlanningStorage>,
    clock: Arc<dyn Clock>,
    limits: Limits,
    storage_timeout: Duration,
}

impl PlanningService {
    /// Create a service over `store` and `storage`.
    pub fn new(
        store: Arc<SessionStore>,
        storage: Arc<dyn PlanningStorage>,
        clock: Arc<dyn Clock>,
        limits: Limits,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            clock,
            limits,
            storage_timeout,
        }
    }

    /// The session cache.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The user's active session, if any.
    pub async fn active_session(&self, user_id: UserId) -> Option<Session> {
        self.store.get(user_id).await
    }

    /// Make `request.planning_id` the user's active planning.
    ///
    /// Any current session is flushed first. A request without a planning
    /// only deactivates. A request older than the user's last recorded
    /// activity fails with `OutdatedReport` and leaves no session.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, planning_id = ?request.planning_id))]
    pub async fn set_active(&self, request: ActivationRequest) -> Result<()> {
        self.store
            .modify(request.user_id, |current| self.flush_transaction(current, None))
            .await?;

        let Some(planning_id) = request.planning_id else {
            info!("Active planning cleared");
            return Ok(());
        };

        let last_activity = self
            .call(
                "load last activity",
                self.storage.last_activity(request.user_id),
            )
            .await?;
        if last_activity > request.time {
            warn!(
                last_activity = last_activity,
                time = request.time,
                "Activation is older than the last recorded activity"
            );
            return Err(TrackingError::OutdatedReport);
        }

        let created_at = self
            .call(
                "load planning created_at",
                self.storage.planning_created_at(planning_id),
            )
            .await?;

        self.store
            .upsert(Session::new(
                request.user_id,
                planning_id,
                created_at,
                request.time,
            ))
            .await;

        info!(started_at = request.time, "Planning activated");
        Ok(())
    }

    /// Reconcile a progress report with the user's active session.
    ///
    /// Returns whether the time was credited online or recorded as an offline
    /// interval. Rejected reports leave the session untouched.
    #[instrument(skip(self, report), fields(user_id = %report.user_id, planning_id = %report.planning_id))]
    pub async fn add_spent_time(&self, report: SpentTimeReport) -> Result<SpentTimeStatus> {
        self.store
            .modify(report.user_id, |current| async move {
                let Some(session) = current else {
                    return Transaction::reject(TrackingError::NoActiveSession);
                };

                let now = self.clock.now();
                let decision = match reconcile::check_report(now, &session, &report, &self.limits) {
                    Ok(decision) => decision,
                    Err(e) => {
                        if e.is_internal() {
                            error!(
                                error = %e,
                                session_planning_id = %session.planning_id,
                                "Failed to reconcile spent time report"
                            );
                        }
                        return Transaction::reject(e);
                    }
                };

                if let Some(interval) = decision.offline_interval() {
                    let saved = self
                        .call(
                            "save offline spent time",
                            self.storage.add_spent_time(interval),
                        )
                        .await;
                    if let Err(e) = saved {
                        return Transaction::reject(e);
                    }
                }

                Transaction::Keep(decision.apply(&session), decision.status())
            })
            .await
    }

    /// Close a planning on behalf of `user_id`.
    ///
    /// The active session is flushed only when it times this planning.
    #[instrument(skip(self, report), fields(user_id = %user_id, planning_id = %report.planning_id))]
    pub async fn close_planning(&self, user_id: UserId, report: PlanningReport) -> Result<()> {
        self.store
            .modify(user_id, |current| {
                self.flush_transaction(current, Some(report.planning_id))
            })
            .await?;

        self.call(
            "close planning",
            self.storage.close_planning(user_id, report),
        )
        .await?;

        info!(progress = report.progress, "Planning closed");
        Ok(())
    }

    /// Seconds spent by the user on plannings in `[from, to]`.
    ///
    /// The active session counts when it started within the range.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn spent_time(&self, user_id: UserId, from: i64, to: i64) -> Result<i64> {
        let cached = self
            .store
            .get(user_id)
            .await
            .filter(|session| from <= session.started_at && session.started_at <= to)
            .map_or(0, |session| session.spent_seconds);

        let stored = self
            .call(
                "sum spent time",
                self.storage.spent_time_in_range(user_id, from, to),
            )
            .await?;

        Ok(cached + stored)
    }

    /// The user's open plannings, each flagged when it can no longer accept
    /// reports.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn opened_plannings(&self, user_id: UserId) -> Result<Vec<ExtendedPlanning>> {
        let mut plannings = self
            .call(
                "load opened plannings",
                self.storage.opened_plannings(user_id),
            )
            .await?;

        let now = self.clock.now();
        for extended in &mut plannings {
            extended.outdated = self.limits.is_outdated(
                now,
                extended.planning.created_at,
                extended.last_activity,
            );
        }
        Ok(plannings)
    }

    /// Record a new estimation for a planning.
    #[instrument(skip(self, user_id, planned), fields(user_id = %user_id, planning_id = %planned.planning_id))]
    pub async fn add_extra_time(&self, user_id: UserId, planned: PlannedTime) -> Result<()> {
        self.call(
            "add extra time",
            self.storage.add_extra_time(user_id, planned),
        )
        .await
    }

    /// Create a planning.
    #[instrument(skip(self, planning), fields(user_id = %planning.user_id))]
    pub async fn create_planning(&self, planning: NewPlanning) -> Result<PlanningId> {
        let id = self
            .call("create planning", self.storage.create_planning(planning))
            .await?;
        info!(planning_id = %id, "Planning created");
        Ok(id)
    }

    /// Load a planning.
    pub async fn planning(&self, id: PlanningId) -> Result<Option<Planning>> {
        self.call("load planning", self.storage.planning(id)).await
    }

    /// Flush `current` to storage, unless it times a planning other than
    /// `only`.
    async fn flush_transaction(
        &self,
        current: Option<Session>,
        only: Option<PlanningId>,
    ) -> Transaction<()> {
        let Some(session) = current else {
            return Transaction::Delete(());
        };
        if let Some(planning_id) = only
            && planning_id != session.planning_id
        {
            return Transaction::Keep(session, ());
        }

        let history = reconcile::flush(&session);
        match self
            .call(
                "save spent time history",
                self.storage.add_spent_time(history),
            )
            .await
        {
            Ok(()) => Transaction::Delete(()),
            Err(e) => {
                warn!(
                    user_id = %session.user_id,
                    planning_id = %session.planning_id,
                    spent_seconds = session.spent_seconds,
                    "Session kept after failed flush"
                );
                Transaction::Reject {
                    mutation: Some(Mutation::Keep(session)),
                    error: e,
                }
            }
        }
    }

    /// Run a storage call under the storage deadline.
    ///
    /// Internal failures are logged here, inside the caller's span, so the
    /// event carries the user and planning the call was made for.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(result) => result.map_err(|e| e.with_operation(operation)),
            Err(_) => Err(TrackingError::Timeout {
                operation: operation.to_string(),
            }),
        };

        match &result {
            Err(e @ TrackingError::Timeout { .. }) => {
                warn!(operation, error = %e, "Storage call timed out");
            }
            Err(e) if e.is_internal() => {
                error!(operation, error = %e, "Storage call failed");
            }
            _ => {}
        }
        result
    }
}
