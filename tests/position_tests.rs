//! Position timelines share the temporal mechanics of organization units.

mod support;

use sqlx::PgPool;
use uuid::Uuid;

use org_temporal_core::services::InsertPositionVersionRequest;
use org_temporal_core::state_machine::UnitStatus;

use support::{actor, context, create_org, create_position, date, org_service, position_service};

#[sqlx::test(migrations = "./migrations")]
async fn position_versions_tile_like_organizations(pool: PgPool) {
    let tenant = Uuid::new_v4();
    create_org(&org_service(&pool), tenant, "ORG", None, date(2025, 1, 1)).await;
    let service = position_service(&pool);
    create_position(&service, tenant, "POS", "ORG", 1.0, date(2025, 1, 1)).await;

    service
        .insert_version(
            tenant,
            "POS",
            date(2025, 6, 1),
            InsertPositionVersionRequest {
                title: Some("Senior Title".to_string()),
                headcount_capacity: Some(2.0),
                ..Default::default()
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap();

    let timeline = service.timeline(tenant, "POS").await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].end_date, Some(date(2025, 6, 1)));
    assert!(timeline[1].is_current);
    assert_eq!(timeline[1].title, "Senior Title");
    assert!((timeline[1].headcount_capacity - 2.0).abs() < 1e-9);
    // unset attributes inherit
    assert_eq!(timeline[1].employment_type, "FULL_TIME");

    let err = service
        .insert_version(
            tenant,
            "POS",
            date(2025, 6, 1),
            InsertPositionVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TEMPORAL_POINT_CONFLICT");
}

#[sqlx::test(migrations = "./migrations")]
async fn position_requires_an_active_organization_at_the_date(pool: PgPool) {
    let tenant = Uuid::new_v4();
    // organization only active from 2026
    create_org(&org_service(&pool), tenant, "LATE", None, date(2026, 1, 1)).await;

    let err = position_service(&pool)
        .create_position(
            tenant,
            support::position_request("POS", "LATE", 1.0, date(2025, 6, 1)),
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TEMPORAL_PARENT_UNAVAILABLE");
}

#[sqlx::test(migrations = "./migrations")]
async fn position_status_change_and_delete_repair_the_timeline(pool: PgPool) {
    let tenant = Uuid::new_v4();
    create_org(&org_service(&pool), tenant, "ORG", None, date(2025, 1, 1)).await;
    let service = position_service(&pool);
    create_position(&service, tenant, "POS", "ORG", 1.0, date(2025, 1, 1)).await;

    let suspended = service
        .change_status(
            tenant,
            "POS",
            UnitStatus::Inactive,
            date(2025, 7, 1),
            None,
            &actor(),
            &context(),
        )
        .await
        .unwrap()
        .entity;
    assert_eq!(suspended.status, "INACTIVE");
    assert!(suspended.is_current);

    service
        .delete_version(tenant, suspended.record_id, &actor(), &context())
        .await
        .unwrap();

    let timeline = service.timeline(tenant, "POS").await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].end_date, None);
    assert!(timeline[0].is_current);
    assert_eq!(timeline[0].status, "ACTIVE");
}

#[sqlx::test(migrations = "./migrations")]
async fn moving_a_position_version_keeps_attributes(pool: PgPool) {
    let tenant = Uuid::new_v4();
    create_org(&org_service(&pool), tenant, "ORG", None, date(2025, 1, 1)).await;
    let service = position_service(&pool);
    create_position(&service, tenant, "POS", "ORG", 1.5, date(2025, 1, 1)).await;

    let second = service
        .insert_version(
            tenant,
            "POS",
            date(2025, 3, 1),
            InsertPositionVersionRequest {
                title: Some("Interim Title".to_string()),
                ..Default::default()
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap()
        .entity;

    let moved = service
        .update_version_effective_date(
            tenant,
            second.record_id,
            date(2025, 5, 1),
            &actor(),
            &context(),
        )
        .await
        .unwrap()
        .entity;

    assert_ne!(moved.record_id, second.record_id);
    assert_eq!(moved.effective_date, date(2025, 5, 1));
    assert_eq!(moved.title, "Interim Title");
    assert!((moved.headcount_capacity - 1.5).abs() < 1e-9);

    let timeline = service.timeline(tenant, "POS").await.unwrap();
    assert_eq!(timeline[0].end_date, Some(date(2025, 5, 1)));
}
