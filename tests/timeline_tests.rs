//! Timeline mutation and recalculation behavior over a real database.

mod support;

use sqlx::PgPool;
use uuid::Uuid;

use org_temporal_core::services::InsertVersionRequest;
use org_temporal_core::state_machine::UnitStatus;
use org_temporal_core::OrganizationUnit;

use support::{actor, context, create_org, date, org_service};

#[sqlx::test(migrations = "./migrations")]
async fn single_version_is_current_and_open_ended(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    let created = create_org(&service, tenant, "HQ", None, date(2025, 1, 1)).await;
    assert!(created.is_current);
    assert_eq!(created.end_date, None);
    assert_eq!(created.level, 1);
    assert_eq!(created.code_path, "HQ");
}

#[sqlx::test(migrations = "./migrations")]
async fn three_versions_tile_and_middle_is_current(pool: PgPool) {
    // versions at 2025-01-01, 2025-06-01, 2026-01-01 with today pinned to
    // 2025-08-15: the June version is current and end dates chain exactly
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "OPS", None, date(2025, 1, 1)).await;
    service
        .insert_version(
            tenant,
            "OPS",
            date(2025, 6, 1),
            InsertVersionRequest {
                name: Some("Operations (renamed)".to_string()),
                ..Default::default()
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap();
    service
        .insert_version(
            tenant,
            "OPS",
            date(2026, 1, 1),
            InsertVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap();

    let timeline = service.timeline(tenant, "OPS").await.unwrap();
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0].end_date, Some(date(2025, 6, 1)));
    assert_eq!(timeline[1].end_date, Some(date(2026, 1, 1)));
    assert_eq!(timeline[2].end_date, None);

    assert!(!timeline[0].is_current);
    assert!(timeline[1].is_current);
    assert!(!timeline[2].is_current);
    assert_eq!(timeline[1].name, "Operations (renamed)");
}

#[sqlx::test(migrations = "./migrations")]
async fn all_future_timeline_has_no_current_version(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "FUT", None, date(2026, 3, 1)).await;

    let current = OrganizationUnit::find_current(&pool, tenant, "FUT")
        .await
        .unwrap();
    assert!(current.is_none());

    let timeline = service.timeline(tenant, "FUT").await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert!(!timeline[0].is_current);
}

#[sqlx::test(migrations = "./migrations")]
async fn occupied_effective_date_is_rejected(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "DUP", None, date(2025, 1, 1)).await;

    let err = service
        .insert_version(
            tenant,
            "DUP",
            date(2025, 1, 1),
            InsertVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TEMPORAL_POINT_CONFLICT");
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_code_on_creation_is_rejected(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "SALES", None, date(2025, 1, 1)).await;

    let err = service
        .create_organization(
            tenant,
            support::org_request("SALES", None, date(2025, 2, 1)),
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_CODE");

    // other tenants are unaffected
    let other_tenant = Uuid::new_v4();
    create_org(&service, other_tenant, "SALES", None, date(2025, 1, 1)).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn moving_a_version_replaces_the_record_and_retiles(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "ENG", None, date(2025, 1, 1)).await;
    let second = service
        .insert_version(
            tenant,
            "ENG",
            date(2025, 6, 1),
            InsertVersionRequest::default(),
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
            date(2025, 9, 1),
            &actor(),
            &context(),
        )
        .await
        .unwrap()
        .entity;

    // the old record is gone, the replacement has a fresh id
    assert_ne!(moved.record_id, second.record_id);
    assert!(
        OrganizationUnit::find_by_record_id(&pool, tenant, second.record_id)
            .await
            .unwrap()
            .is_none()
    );

    let timeline = service.timeline(tenant, "ENG").await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].end_date, Some(date(2025, 9, 1)));
    assert_eq!(timeline[1].effective_date, date(2025, 9, 1));
    // the September version is now future, so January is current again
    assert!(timeline[0].is_current);
    assert!(!timeline[1].is_current);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_middle_version_closes_the_gap(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "FIN", None, date(2025, 1, 1)).await;
    let middle = service
        .insert_version(
            tenant,
            "FIN",
            date(2025, 4, 1),
            InsertVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap()
        .entity;
    service
        .insert_version(
            tenant,
            "FIN",
            date(2026, 1, 1),
            InsertVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap();

    service
        .delete_version(tenant, middle.record_id, &actor(), &context())
        .await
        .unwrap();

    let timeline = service.timeline(tenant, "FIN").await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].end_date, Some(date(2026, 1, 1)));
    assert_eq!(timeline[1].end_date, None);
    assert!(timeline[0].is_current);
}

#[sqlx::test(migrations = "./migrations")]
async fn status_change_inserts_an_inheriting_version(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "SUP", None, date(2025, 1, 1)).await;

    let suspended = service
        .suspend(
            tenant,
            "SUP",
            date(2025, 7, 1),
            Some("restructuring".to_string()),
            &actor(),
            &context(),
        )
        .await
        .unwrap()
        .entity;

    assert_eq!(suspended.status, "INACTIVE");
    assert_eq!(suspended.effective_date, date(2025, 7, 1));
    assert_eq!(suspended.name, "SUP Unit");
    assert!(suspended.is_current);

    let timeline = service.timeline(tenant, "SUP").await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].end_date, Some(date(2025, 7, 1)));
}

#[sqlx::test(migrations = "./migrations")]
async fn repeated_status_change_is_idempotent(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "IDP", None, date(2025, 1, 1)).await;
    service
        .suspend(tenant, "IDP", date(2025, 7, 1), None, &actor(), &context())
        .await
        .unwrap();

    // same request again: no new version, no error
    service
        .suspend(tenant, "IDP", date(2025, 7, 1), None, &actor(), &context())
        .await
        .unwrap();

    let timeline = service.timeline(tenant, "IDP").await.unwrap();
    assert_eq!(timeline.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn status_change_merges_into_an_existing_version_at_the_date(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "MRG", None, date(2025, 1, 1)).await;
    service
        .insert_version(
            tenant,
            "MRG",
            date(2025, 6, 1),
            InsertVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap();

    let changed = service
        .suspend(tenant, "MRG", date(2025, 6, 1), None, &actor(), &context())
        .await
        .unwrap()
        .entity;

    // merged in place: still two versions, the June one now INACTIVE
    assert_eq!(changed.status, "INACTIVE");
    assert_eq!(changed.effective_date, date(2025, 6, 1));
    let timeline = service.timeline(tenant, "MRG").await.unwrap();
    assert_eq!(timeline.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn forbidden_status_transition_is_rejected(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    let mut request = support::org_request("PLN", None, date(2026, 1, 1));
    request.status = UnitStatus::Planned;
    service
        .create_organization(tenant, request, &actor(), &context())
        .await
        .unwrap();

    // PLANNED may not go directly to INACTIVE
    let err = service
        .change_status(
            tenant,
            "PLN",
            UnitStatus::Inactive,
            date(2026, 2, 1),
            None,
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
}

#[sqlx::test(migrations = "./migrations")]
async fn point_in_time_lookup_uses_exclusive_end_dates(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "PIT", None, date(2025, 1, 1)).await;
    let second = service
        .insert_version(
            tenant,
            "PIT",
            date(2025, 6, 1),
            InsertVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap()
        .entity;

    // the boundary date belongs to the newer version
    let at_boundary = OrganizationUnit::find_at_date(&pool, tenant, "PIT", date(2025, 6, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(at_boundary.record_id, second.record_id);

    let day_before = OrganizationUnit::find_at_date(&pool, tenant, "PIT", date(2025, 5, 31))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(day_before.record_id, second.record_id);

    // before the first version there is nothing
    let before_start = OrganizationUnit::find_at_date(&pool, tenant, "PIT", date(2024, 12, 31))
        .await
        .unwrap();
    assert!(before_start.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn consistency_recalculation_repairs_tampered_fields(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    create_org(&service, tenant, "FIX", None, date(2025, 1, 1)).await;
    service
        .insert_version(
            tenant,
            "FIX",
            date(2025, 6, 1),
            InsertVersionRequest::default(),
            &actor(),
            &context(),
        )
        .await
        .unwrap();

    // corrupt the derived fields out of band
    sqlx::query(
        "UPDATE organization_units SET is_current = false, end_date = NULL
         WHERE tenant_id = $1 AND code = 'FIX'",
    )
    .bind(tenant)
    .execute(&pool)
    .await
    .unwrap();

    service.recalculate_timeline(tenant, "FIX").await.unwrap();

    let timeline = service.timeline(tenant, "FIX").await.unwrap();
    assert_eq!(timeline[0].end_date, Some(date(2025, 6, 1)));
    assert!(timeline[1].is_current);
}

#[sqlx::test(migrations = "./migrations")]
async fn status_patch_cannot_soft_delete(pool: PgPool) {
    let service = org_service(&pool);
    let tenant = Uuid::new_v4();

    let created = create_org(&service, tenant, "ORG", None, date(2025, 1, 1)).await;

    let err = service
        .update_current_version(
            tenant,
            "ORG",
            created.record_id,
            org_temporal_core::services::UpdateOrganizationRequest {
                status: Some(UnitStatus::Deleted),
                ..Default::default()
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_REQUEST");

    // the timeline is untouched and the version is still visible
    let timeline = service.timeline(tenant, "ORG").await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].status, "ACTIVE");
    assert!(timeline[0].is_current);
    assert!(timeline[0].deleted_at.is_none());
}
