// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for plantime-core integration tests.
//!
//! Provides TestContext wiring an in-memory SQLite storage, a session cache
//! backed by a temp directory and a manually driven clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

use plantime_core::cache::SessionStore;
use plantime_core::clock::FixedClock;
use plantime_core::migrations;
use plantime_core::model::{
    ActivationRequest, NewPlanning, PlanningId, SpentTimeReport, UserId,
};
use plantime_core::persistence::{PlanningStorage, SqlitePlanningStorage};
use plantime_core::reconcile::Limits;
use plantime_core::service::PlanningService;

/// Test context that manages storage, cache and service for integration tests.
pub struct TestContext {
    pub dir: TempDir,
    pub clock: Arc<FixedClock>,
    pub storage: Arc<SqlitePlanningStorage>,
    pub service: PlanningService,
}

impl TestContext {
    /// Create a new test context with the clock at `now`.
    pub async fn new(now: i64) -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        migrations::run_sqlite(&pool)
            .await
            .expect("Failed to run migrations");

        let dir = TempDir::new().expect("Failed to create backup dir");
        let clock = Arc::new(FixedClock::new(now));
        let storage = Arc::new(SqlitePlanningStorage::with_clock(pool, clock.clone()));
        let service = Self::service_for(&dir, &storage, &clock);

        Self {
            dir,
            clock,
            storage,
            service,
        }
    }

    fn service_for(
        dir: &TempDir,
        storage: &Arc<SqlitePlanningStorage>,
        clock: &Arc<FixedClock>,
    ) -> PlanningService {
        let store = Arc::new(SessionStore::new(dir.path(), Duration::from_millis(500)));
        PlanningService::new(
            store,
            storage.clone(),
            clock.clone(),
            Limits::default(),
            Duration::from_secs(5),
        )
    }

    /// Simulate a process restart: a fresh cache restored from the backup
    /// directory, sharing the same storage and clock.
    pub async fn restart(&mut self) -> usize {
        let service = Self::service_for(&self.dir, &self.storage, &self.clock);
        let restored = service
            .store()
            .restore()
            .await
            .expect("Failed to restore sessions");
        self.service = service;
        restored
    }

    /// Create a planning for `user` at the current clock time.
    pub async fn create_planning(&self, user: UserId) -> PlanningId {
        self.storage
            .create_planning(NewPlanning {
                user_id: user,
                issue_title: "Integration".to_string(),
                estimation: 3600,
                ..Default::default()
            })
            .await
            .expect("Failed to create planning")
    }

    /// Activate `planning` for `user` at `time`.
    pub async fn activate(&self, user: UserId, planning: PlanningId, time: i64) {
        self.service
            .set_active(ActivationRequest {
                user_id: user,
                planning_id: Some(planning),
                time,
            })
            .await
            .expect("Failed to activate planning");
    }
}

/// Progress report helper.
pub fn report(user: UserId, planning: PlanningId, spent: i64, time: i64) -> SpentTimeReport {
    SpentTimeReport {
        user_id: user,
        planning_id: planning,
        spent,
        time,
    }
}
