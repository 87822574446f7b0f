//! FTE ledger, occupancy, and the acting auto-revert sweep.

mod support;

use sqlx::PgPool;
use uuid::Uuid;

use org_temporal_core::services::{FillPositionRequest, UpdateAssignmentRequest};
use org_temporal_core::state_machine::AssignmentType;
use org_temporal_core::Position;

use support::{
    actor, assignment_service, context, create_org, create_position, date, org_service,
    position_service,
};

fn fill_request(position_code: &str, fte: f64) -> FillPositionRequest {
    FillPositionRequest {
        position_code: position_code.to_string(),
        employee_id: Uuid::new_v4(),
        employee_name: "Alex Example".to_string(),
        employee_number: Some("E-1001".to_string()),
        assignment_type: AssignmentType::Primary,
        fte,
        effective_date: date(2025, 2, 1),
        acting_until: None,
        auto_revert: false,
        notes: None,
    }
}

async fn setup_position(pool: &PgPool, tenant: Uuid, capacity: f64) -> Position {
    let orgs = org_service(pool);
    let positions = position_service(pool);
    create_org(&orgs, tenant, "ORG", None, date(2025, 1, 1)).await;
    create_position(&positions, tenant, "POS", "ORG", capacity, date(2025, 1, 1)).await
}

#[sqlx::test(migrations = "./migrations")]
async fn filling_to_capacity_marks_the_position_filled(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    let assignment = service
        .fill_position(tenant, fill_request("POS", 1.0), &actor(), &context())
        .await
        .unwrap();
    assert_eq!(assignment.assignment_status, "ACTIVE");

    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.occupancy_status, "FILLED");
    assert!((position.headcount_in_use - 1.0).abs() < 1e-9);
}

#[sqlx::test(migrations = "./migrations")]
async fn partial_fill_marks_partially_filled(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 2.0).await;
    let service = assignment_service(&pool);

    service
        .fill_position(tenant, fill_request("POS", 0.5), &actor(), &context())
        .await
        .unwrap();

    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.occupancy_status, "PARTIALLY_FILLED");

    let listed = position_service(&pool)
        .list_for_organization(tenant, "ORG")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].code, "POS");
}

#[sqlx::test(migrations = "./migrations")]
async fn overfilling_capacity_is_rejected(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    service
        .fill_position(tenant, fill_request("POS", 0.6), &actor(), &context())
        .await
        .unwrap();

    let err = service
        .fill_position(tenant, fill_request("POS", 0.6), &actor(), &context())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_HEADCOUNT");
}

#[sqlx::test(migrations = "./migrations")]
async fn future_fill_is_pending_and_does_not_consume_capacity(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 2.0).await;
    let service = assignment_service(&pool);

    let mut request = fill_request("POS", 1.0);
    request.effective_date = date(2026, 1, 1);
    let pending = service
        .fill_position(tenant, request, &actor(), &context())
        .await
        .unwrap();
    assert_eq!(pending.assignment_status, "PENDING");

    // the position stays vacant until the start date arrives
    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.occupancy_status, "VACANT");

    service
        .fill_position(tenant, fill_request("POS", 1.0), &actor(), &context())
        .await
        .unwrap();
    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.occupancy_status, "PARTIALLY_FILLED");
    assert!((position.headcount_in_use - 1.0).abs() < 1e-9);
}

#[sqlx::test(migrations = "./migrations")]
async fn future_fill_is_checked_against_active_capacity(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    service
        .fill_position(tenant, fill_request("POS", 1.0), &actor(), &context())
        .await
        .unwrap();

    // a future start date does not dodge the headcount check
    let mut request = fill_request("POS", 1.0);
    request.effective_date = date(2026, 1, 1);
    let err = service
        .fill_position(tenant, request, &actor(), &context())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_HEADCOUNT");
}

#[sqlx::test(migrations = "./migrations")]
async fn pending_activation_rechecks_capacity(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    let mut request = fill_request("POS", 1.0);
    request.effective_date = date(2026, 1, 1);
    let pending = service
        .fill_position(tenant, request, &actor(), &context())
        .await
        .unwrap();

    // the capacity the pending fill was accepted against is taken meanwhile
    service
        .fill_position(tenant, fill_request("POS", 1.0), &actor(), &context())
        .await
        .unwrap();

    sqlx::query(
        "UPDATE position_assignments SET effective_date = '2025-08-01' \
         WHERE assignment_id = $1",
    )
    .bind(pending.assignment_id)
    .execute(&pool)
    .await
    .unwrap();

    let activated = service.activate_due_assignments().await.unwrap();
    assert_eq!(activated, 0);

    let held = org_temporal_core::PositionAssignment::find_by_id(
        &pool,
        tenant,
        pending.assignment_id,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(held.assignment_status, "PENDING");

    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert!((position.headcount_in_use - 1.0).abs() < 1e-9);
    assert_eq!(position.occupancy_status, "FILLED");
}

#[sqlx::test(migrations = "./migrations")]
async fn vacating_frees_capacity_and_ends_the_assignment(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    let assignment = service
        .fill_position(tenant, fill_request("POS", 1.0), &actor(), &context())
        .await
        .unwrap();

    let closed = service
        .vacate_position(
            tenant,
            assignment.assignment_id,
            date(2025, 7, 31),
            &actor(),
            &context(),
        )
        .await
        .unwrap();
    assert_eq!(closed.assignment_status, "ENDED");
    assert_eq!(closed.end_date, Some(date(2025, 7, 31)));

    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.occupancy_status, "VACANT");

    let listed = service.list_for_position(tenant, "POS").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].assignment_status, "ENDED");

    // ended assignments are immutable
    let err = service
        .vacate_position(
            tenant,
            assignment.assignment_id,
            date(2025, 8, 1),
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ASSIGNMENT_STATE");
}

#[sqlx::test(migrations = "./migrations")]
async fn end_date_before_effective_date_is_rejected(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    let assignment = service
        .fill_position(tenant, fill_request("POS", 1.0), &actor(), &context())
        .await
        .unwrap();

    let err = service
        .vacate_position(
            tenant,
            assignment.assignment_id,
            date(2025, 1, 15),
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_REQUEST");
}

#[sqlx::test(migrations = "./migrations")]
async fn fte_increase_is_rechecked_against_capacity(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    service
        .fill_position(tenant, fill_request("POS", 0.5), &actor(), &context())
        .await
        .unwrap();
    let second = service
        .fill_position(tenant, fill_request("POS", 0.4), &actor(), &context())
        .await
        .unwrap();

    let err = service
        .update_assignment(
            tenant,
            second.assignment_id,
            UpdateAssignmentRequest {
                fte: Some(0.6),
                ..Default::default()
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_HEADCOUNT");

    // shrinking works and the ledger follows
    let updated = service
        .update_assignment(
            tenant,
            second.assignment_id,
            UpdateAssignmentRequest {
                fte: Some(0.25),
                ..Default::default()
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap();
    assert!((updated.fte - 0.25).abs() < 1e-9);

    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert!((position.headcount_in_use - 0.75).abs() < 1e-9);
}

#[sqlx::test(migrations = "./migrations")]
async fn auto_revert_requires_acting_with_a_date(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 1.0).await;
    let service = assignment_service(&pool);

    let mut request = fill_request("POS", 1.0);
    request.auto_revert = true;
    let err = service
        .fill_position(tenant, request, &actor(), &context())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_REQUEST");

    let mut request = fill_request("POS", 1.0);
    request.assignment_type = AssignmentType::Acting;
    request.auto_revert = true;
    let err = service
        .fill_position(tenant, request, &actor(), &context())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_REQUEST");
}

#[sqlx::test(migrations = "./migrations")]
async fn auto_revert_sweep_closes_expired_acting_assignments(pool: PgPool) {
    let tenant = Uuid::new_v4();
    setup_position(&pool, tenant, 2.0).await;
    let service = assignment_service(&pool);

    // expired acting cover: acting_until already passed
    let mut expired = fill_request("POS", 1.0);
    expired.assignment_type = AssignmentType::Acting;
    expired.acting_until = Some(date(2025, 7, 31));
    expired.auto_revert = true;
    let expired = service
        .fill_position(tenant, expired, &actor(), &context())
        .await
        .unwrap();

    // still-running acting cover stays untouched
    let mut running = fill_request("POS", 1.0);
    running.assignment_type = AssignmentType::Acting;
    running.acting_until = Some(date(2025, 12, 31));
    running.auto_revert = true;
    let running = service
        .fill_position(tenant, running, &actor(), &context())
        .await
        .unwrap();

    let outcome = service.process_auto_reverts().await.unwrap();
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.failed, 0);

    let closed = org_temporal_core::PositionAssignment::find_by_id(
        &pool,
        tenant,
        expired.assignment_id,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(closed.assignment_status, "ENDED");
    assert_eq!(closed.end_date, Some(date(2025, 7, 31)));

    let untouched = org_temporal_core::PositionAssignment::find_by_id(
        &pool,
        tenant,
        running.assignment_id,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(untouched.assignment_status, "ACTIVE");

    let position = Position::find_current(&pool, tenant, "POS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.occupancy_status, "PARTIALLY_FILLED");
    assert!((position.headcount_in_use - 1.0).abs() < 1e-9);
}
