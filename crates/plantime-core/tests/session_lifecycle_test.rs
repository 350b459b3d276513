// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the session lifecycle against SQLite storage.

mod common;

use common::*;
use plantime_core::TrackingError;
use plantime_core::model::{
    ActivationRequest, PlanningReport, PlanningStatus, SpentTimeStatus, UserId,
};
use plantime_core::persistence::PlanningStorage;

const USER: UserId = UserId(7);

#[tokio::test]
async fn test_full_session_lifecycle() {
    let ctx = TestContext::new(1_000).await;
    let planning = ctx.create_planning(USER).await;

    // 1. Activate
    ctx.activate(USER, planning, 1_000).await;

    // 2. Two online reports
    ctx.clock.set(1_060);
    let status = ctx
        .service
        .add_spent_time(report(USER, planning, 60, 1_060))
        .await
        .expect("Report should be accepted");
    assert_eq!(status, SpentTimeStatus::Online);

    ctx.clock.set(1_120);
    ctx.service
        .add_spent_time(report(USER, planning, 60, 1_120))
        .await
        .expect("Report should be accepted");

    // 3. The client went quiet; the next report is recorded as offline
    ctx.clock.set(1_500);
    let status = ctx
        .service
        .add_spent_time(report(USER, planning, 300, 1_480))
        .await
        .expect("Report should be accepted");
    assert_eq!(status, SpentTimeStatus::Offline);

    let session = ctx.service.active_session(USER).await.unwrap();
    assert_eq!(session.last_checkpoint, 1_480);
    assert_eq!(session.spent_seconds, 420);

    let stored = ctx.storage.planning(planning).await.unwrap().unwrap();
    assert_eq!(stored.spent_offline, 300);
    assert_eq!(stored.spent_online, 0);

    // Offline time is both persisted and still held by the session
    assert_eq!(ctx.service.spent_time(USER, 0, 2_000).await.unwrap(), 720);

    // 4. Close flushes the session and finalizes totals
    ctx.service
        .close_planning(
            USER,
            PlanningReport {
                planning_id: planning,
                progress: 100,
                time: 1_500,
            },
        )
        .await
        .expect("Close should succeed");

    assert!(ctx.service.active_session(USER).await.is_none());

    let closed = ctx.storage.planning(planning).await.unwrap().unwrap();
    assert_eq!(closed.status, PlanningStatus::Closed);
    assert_eq!(closed.spent_online, 420);
    assert_eq!(closed.spent_offline, 300);
    assert_eq!(closed.issue_done, 100);
    assert_eq!(closed.reported, 1_500);

    assert_eq!(ctx.service.spent_time(USER, 0, 2_000).await.unwrap(), 720);
    assert_eq!(ctx.storage.last_activity(USER).await.unwrap(), 1_480);

    // 5. Closing twice is rejected
    let err = ctx
        .service
        .close_planning(
            USER,
            PlanningReport {
                planning_id: planning,
                progress: 100,
                time: 1_600,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TrackingError::PlanningClosed(_)));
}

#[tokio::test]
async fn test_switching_plannings_flushes_previous() {
    let ctx = TestContext::new(1_000).await;
    let first = ctx.create_planning(USER).await;
    let second = ctx.create_planning(USER).await;

    ctx.activate(USER, first, 1_000).await;
    ctx.clock.set(1_030);
    ctx.service
        .add_spent_time(report(USER, first, 30, 1_030))
        .await
        .unwrap();

    ctx.activate(USER, second, 1_040).await;

    let flushed = ctx.storage.planning(first).await.unwrap().unwrap();
    assert_eq!(flushed.spent_online, 30);
    assert_eq!(flushed.status, PlanningStatus::Open);

    let session = ctx.service.active_session(USER).await.unwrap();
    assert_eq!(session.planning_id, second);
    assert_eq!(session.started_at, 1_040);

    // Reports for the old planning no longer match the session
    ctx.clock.set(1_045);
    let err = ctx
        .service
        .add_spent_time(report(USER, first, 5, 1_045))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackingError::InvalidPlanning(_)));
}

#[tokio::test]
async fn test_activation_older_than_last_activity() {
    let ctx = TestContext::new(1_000).await;
    let planning = ctx.create_planning(USER).await;

    ctx.activate(USER, planning, 1_000).await;
    ctx.clock.set(1_050);
    ctx.service
        .add_spent_time(report(USER, planning, 50, 1_050))
        .await
        .unwrap();

    let err = ctx
        .service
        .set_active(ActivationRequest {
            user_id: USER,
            planning_id: Some(planning),
            time: 1_020,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TrackingError::OutdatedReport));
    assert!(ctx.service.active_session(USER).await.is_none());
    assert_eq!(
        ctx.storage.planning(planning).await.unwrap().unwrap().spent_online,
        50,
        "previous session is flushed before the check"
    );
}

#[tokio::test]
async fn test_activate_unknown_planning() {
    let ctx = TestContext::new(1_000).await;

    let err = ctx
        .service
        .set_active(ActivationRequest {
            user_id: USER,
            planning_id: Some(plantime_core::model::PlanningId(999)),
            time: 1_000,
        })
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "INVALID_PLANNING_ID");
    assert!(ctx.service.active_session(USER).await.is_none());
}

#[tokio::test]
async fn test_close_foreign_planning() {
    let ctx = TestContext::new(1_000).await;
    let planning = ctx.create_planning(UserId(1)).await;

    let err = ctx
        .service
        .close_planning(
            USER,
            PlanningReport {
                planning_id: planning,
                progress: 0,
                time: 1_000,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TrackingError::InvalidOwner(_)));
    assert_eq!(err.rpc_code(), 102);
}

#[tokio::test]
async fn test_opened_plannings_marks_stale_ones() {
    let ctx = TestContext::new(1_000).await;
    let stale = ctx.create_planning(USER).await;
    ctx.clock.set(80_000);
    let fresh = ctx.create_planning(USER).await;

    ctx.clock.set(90_000);
    let opened = ctx.service.opened_plannings(USER).await.unwrap();

    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].planning.id, stale);
    assert!(opened[0].outdated, "older than the maximum planning age");
    assert_eq!(opened[1].planning.id, fresh);
    assert!(!opened[1].outdated);
    assert_eq!(opened[1].estimation, 3600);
}
