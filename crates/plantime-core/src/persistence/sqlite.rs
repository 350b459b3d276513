// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed planning storage.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TrackingError};
use crate::migrations;
use crate::model::{
    ExtendedPlanning, NewPlanning, PlannedTime, Planning, PlanningId, PlanningReport,
    PlanningStatus, SpentTimeHistory, SpentTimeStatus, UserId,
};

use super::PlanningStorage;

const PLANNING_COLUMNS: &str = r#"
    p.id, p.user_id, p.status, p.project_id, p.tracker_id, p.issue_id,
    p.issue_title, p.issue_url, p.issue_estimation, p.issue_due_date,
    p.issue_done, p.activity_id, p.spent_online, p.spent_offline,
    p.reported, p.created_at
"#;

fn storage_error(err: sqlx::Error, operation: &str) -> TrackingError {
    TrackingError::Storage {
        operation: operation.to_string(),
        details: err.to_string(),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanningRow {
    id: i64,
    user_id: i64,
    status: String,
    project_id: i64,
    tracker_id: i64,
    issue_id: i64,
    issue_title: String,
    issue_url: String,
    issue_estimation: i64,
    issue_due_date: i64,
    issue_done: i64,
    activity_id: i64,
    spent_online: i64,
    spent_offline: i64,
    reported: i64,
    created_at: i64,
}

impl TryFrom<PlanningRow> for Planning {
    type Error = TrackingError;

    fn try_from(row: PlanningRow) -> Result<Self> {
        let status = row
            .status
            .parse::<PlanningStatus>()
            .map_err(|details| TrackingError::Storage {
                operation: "decode planning".to_string(),
                details,
            })?;

        Ok(Planning {
            id: PlanningId(row.id),
            user_id: UserId(row.user_id),
            status,
            project_id: row.project_id,
            tracker_id: row.tracker_id,
            issue_id: row.issue_id,
            issue_title: row.issue_title,
            issue_url: row.issue_url,
            issue_estimation: row.issue_estimation,
            issue_due_date: row.issue_due_date,
            issue_done: row.issue_done,
            activity_id: row.activity_id,
            spent_online: row.spent_online,
            spent_offline: row.spent_offline,
            reported: row.reported,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExtendedPlanningRow {
    #[sqlx(flatten)]
    planning: PlanningRow,
    estimation: i64,
    last_activity: i64,
}

/// Owner and status of a planning, loaded before mutating it.
#[derive(Debug, sqlx::FromRow)]
struct Ownership {
    user_id: i64,
    status: String,
}

/// SQLite-backed planning storage.
#[derive(Clone)]
pub struct SqlitePlanningStorage {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqlitePlanningStorage {
    /// Create storage from an existing, already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Create storage that stamps new rows with `clock`.
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Connect to `database_url` and run all migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| TrackingError::Storage {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", database_url, e),
            })?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self::new(pool))
    }

    /// Create and initialize storage backed by a database file.
    ///
    /// Creates parent directories and the database file when missing.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| TrackingError::Storage {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        Self::connect(&format!("sqlite:{}?mode=rwc", path.to_string_lossy())).await
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ownership(
        tx: &mut Transaction<'_, Sqlite>,
        id: PlanningId,
    ) -> Result<Option<Ownership>> {
        let row = sqlx::query_as::<_, Ownership>(
            "SELECT user_id, status FROM plannings WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Load the planning for mutation on behalf of `user_id`.
    async fn owned_open_planning(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: UserId,
        id: PlanningId,
    ) -> Result<()> {
        let ownership = Self::ownership(tx, id)
            .await?
            .ok_or(TrackingError::InvalidPlanning(id))?;
        if ownership.user_id != user_id.0 {
            return Err(TrackingError::InvalidOwner(id));
        }
        if ownership.status == PlanningStatus::Closed.as_str() {
            return Err(TrackingError::PlanningClosed(id));
        }
        Ok(())
    }
}

#[async_trait]
impl PlanningStorage for SqlitePlanningStorage {
    async fn create_planning(&self, planning: NewPlanning) -> Result<PlanningId> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO plannings (user_id, status, project_id, tracker_id, issue_id,
                                   issue_title, issue_url, issue_estimation, issue_due_date,
                                   issue_done, activity_id, created_at)
            VALUES (?, 'OPEN', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(planning.user_id.0)
        .bind(planning.project_id)
        .bind(planning.tracker_id)
        .bind(planning.issue_id)
        .bind(&planning.issue_title)
        .bind(&planning.issue_url)
        .bind(planning.issue_estimation)
        .bind(planning.issue_due_date)
        .bind(planning.issue_done)
        .bind(planning.activity_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error(e, "save planning"))?;

        let id = PlanningId(result.last_insert_rowid());

        sqlx::query(
            "INSERT INTO planned_times (planning_id, estimation, reason, created_at) VALUES (?, ?, '', ?)",
        )
        .bind(id.0)
        .bind(planning.estimation)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error(e, "save planned time"))?;

        tx.commit().await?;

        debug!(planning_id = %id, user_id = %planning.user_id, "Planning created");
        Ok(id)
    }

    async fn planning(&self, id: PlanningId) -> Result<Option<Planning>> {
        let query = format!("SELECT {} FROM plannings p WHERE p.id = ?", PLANNING_COLUMNS);
        let row = sqlx::query_as::<_, PlanningRow>(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error(e, "load planning"))?;

        row.map(Planning::try_from).transpose()
    }

    async fn planning_created_at(&self, id: PlanningId) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT created_at FROM plannings WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error(e, "load planning created_at"))?
            .ok_or(TrackingError::InvalidPlanning(id))
    }

    async fn add_spent_time(&self, history: SpentTimeHistory) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if Self::ownership(&mut tx, history.planning_id).await?.is_none() {
            return Err(TrackingError::InvalidPlanning(history.planning_id));
        }

        sqlx::query(
            r#"
            INSERT INTO spent_time_history (planning_id, status, spent, started_at, ended_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(history.planning_id.0)
        .bind(history.status.as_str())
        .bind(history.spent)
        .bind(history.started_at)
        .bind(history.ended_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error(e, "save spent time history"))?;

        let increment = match history.status {
            SpentTimeStatus::Online => {
                "UPDATE plannings SET spent_online = spent_online + ? WHERE id = ?"
            }
            SpentTimeStatus::Offline => {
                "UPDATE plannings SET spent_offline = spent_offline + ? WHERE id = ?"
            }
        };
        sqlx::query(increment)
            .bind(history.spent)
            .bind(history.planning_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error(e, "add spent time to planning"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn last_activity(&self, user_id: UserId) -> Result<i64> {
        let last = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(s.ended_at), 0)
            FROM plannings p
            INNER JOIN spent_time_history s ON p.id = s.planning_id
            WHERE p.user_id = ?
            "#,
        )
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error(e, "load last activity"))?;

        Ok(last)
    }

    async fn spent_time_in_range(&self, user_id: UserId, from: i64, to: i64) -> Result<i64> {
        let spent = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(spent_online + spent_offline), 0)
            FROM plannings
            WHERE user_id = ? AND created_at >= ? AND created_at <= ?
            "#,
        )
        .bind(user_id.0)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error(e, "sum spent time"))?;

        Ok(spent)
    }

    async fn close_planning(&self, user_id: UserId, report: PlanningReport) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        Self::owned_open_planning(&mut tx, user_id, report.planning_id).await?;

        let (online, offline) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN status = 'ONLINE' THEN spent ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'OFFLINE' THEN spent ELSE 0 END), 0)
            FROM spent_time_history
            WHERE planning_id = ?
            "#,
        )
        .bind(report.planning_id.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage_error(e, "load spent time histories"))?;

        sqlx::query(
            r#"
            UPDATE plannings
            SET status = 'CLOSED', spent_online = ?, spent_offline = ?,
                reported = ?, issue_done = ?
            WHERE id = ?
            "#,
        )
        .bind(online)
        .bind(offline)
        .bind(report.time)
        .bind(report.progress)
        .bind(report.planning_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error(e, "update planning"))?;

        tx.commit().await?;

        debug!(
            planning_id = %report.planning_id,
            user_id = %user_id,
            spent_online = online,
            spent_offline = offline,
            "Planning closed"
        );
        Ok(())
    }

    async fn opened_plannings(&self, user_id: UserId) -> Result<Vec<ExtendedPlanning>> {
        let query = format!(
            r#"
            SELECT {},
                   COALESCE((SELECT pt.estimation FROM planned_times pt
                             WHERE pt.planning_id = p.id
                             ORDER BY pt.created_at DESC, pt.id DESC
                             LIMIT 1), 0) AS estimation,
                   COALESCE((SELECT MAX(s.ended_at) FROM spent_time_history s
                             WHERE s.planning_id = p.id), 0) AS last_activity
            FROM plannings p
            WHERE p.user_id = ? AND p.status = 'OPEN'
            ORDER BY p.created_at ASC, p.id ASC
            "#,
            PLANNING_COLUMNS
        );

        let rows = sqlx::query_as::<_, ExtendedPlanningRow>(&query)
            .bind(user_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(e, "load opened plannings"))?;

        rows.into_iter()
            .map(|row| {
                Ok(ExtendedPlanning {
                    planning: Planning::try_from(row.planning)?,
                    estimation: row.estimation,
                    last_activity: row.last_activity,
                    outdated: false,
                })
            })
            .collect()
    }

    async fn add_extra_time(&self, user_id: UserId, planned: PlannedTime) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let ownership = Self::ownership(&mut tx, planned.planning_id)
            .await?
            .ok_or(TrackingError::InvalidPlanning(planned.planning_id))?;
        if ownership.user_id != user_id.0 {
            return Err(TrackingError::InvalidOwner(planned.planning_id));
        }

        sqlx::query(
            "INSERT INTO planned_times (planning_id, estimation, reason, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(planned.planning_id.0)
        .bind(planned.estimation)
        .bind(&planned.reason)
        .bind(self.clock.now())
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error(e, "save planned time"))?;

        tx.commit().await?;
        Ok(())
    }
}
