//! One-shot scheduler entry points against a live database.

mod support;

use sqlx::PgPool;
use uuid::Uuid;

use org_temporal_core::config::SchedulerConfig;
use org_temporal_core::scheduler::Scheduler;
use org_temporal_core::services::FillPositionRequest;
use org_temporal_core::state_machine::AssignmentType;
use org_temporal_core::{OrganizationUnit, PositionAssignment};

use support::{
    actor, assignment_service, context, create_org, create_position, date, fixed_clock,
    org_service, position_service,
};

fn scheduler(pool: &PgPool) -> Scheduler {
    Scheduler::with_clock(pool.clone(), SchedulerConfig::default(), fixed_clock())
}

#[sqlx::test(migrations = "./migrations")]
async fn consistency_check_repairs_tampered_timelines(pool: PgPool) {
    let tenant = Uuid::new_v4();
    create_org(&org_service(&pool), tenant, "ORG", None, date(2025, 1, 1)).await;
    create_position(
        &position_service(&pool),
        tenant,
        "POS",
        "ORG",
        1.0,
        date(2025, 1, 1),
    )
    .await;

    sqlx::query(
        "UPDATE organization_units SET is_current = FALSE, end_date = '2025-03-01' \
         WHERE tenant_id = $1 AND code = 'ORG'",
    )
    .bind(tenant)
    .execute(&pool)
    .await
    .unwrap();

    let outcome = scheduler(&pool).run_consistency_check().await.unwrap();
    assert_eq!(outcome.checked, 2);
    assert_eq!(outcome.failed, 0);

    let org = OrganizationUnit::find_current(&pool, tenant, "ORG")
        .await
        .unwrap()
        .unwrap();
    assert!(org.is_current);
    assert_eq!(org.end_date, None);
}

#[sqlx::test(migrations = "./migrations")]
async fn sweep_activates_due_assignments_and_reverts_expired_acting(pool: PgPool) {
    let tenant = Uuid::new_v4();
    create_org(&org_service(&pool), tenant, "ORG", None, date(2025, 1, 1)).await;
    create_position(
        &position_service(&pool),
        tenant,
        "POS",
        "ORG",
        2.0,
        date(2025, 1, 1),
    )
    .await;
    let service = assignment_service(&pool);

    let acting = service
        .fill_position(
            tenant,
            FillPositionRequest {
                position_code: "POS".to_string(),
                employee_id: Uuid::new_v4(),
                employee_name: "Interim Cover".to_string(),
                employee_number: None,
                assignment_type: AssignmentType::Acting,
                fte: 1.0,
                effective_date: date(2025, 2, 1),
                acting_until: Some(date(2025, 6, 30)),
                auto_revert: true,
                notes: None,
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap();

    // a PENDING assignment whose start date has since arrived
    let due = service
        .fill_position(
            tenant,
            FillPositionRequest {
                position_code: "POS".to_string(),
                employee_id: Uuid::new_v4(),
                employee_name: "New Hire".to_string(),
                employee_number: None,
                assignment_type: AssignmentType::Primary,
                fte: 1.0,
                effective_date: date(2025, 9, 1),
                acting_until: None,
                auto_revert: false,
                notes: None,
            },
            &actor(),
            &context(),
        )
        .await
        .unwrap();
    assert_eq!(due.assignment_status, "PENDING");
    sqlx::query(
        "UPDATE position_assignments SET effective_date = '2025-08-01' \
         WHERE assignment_id = $1",
    )
    .bind(due.assignment_id)
    .execute(&pool)
    .await
    .unwrap();

    scheduler(&pool).run_auto_revert_sweep().await.unwrap();

    let reverted = PositionAssignment::find_by_id(&pool, tenant, acting.assignment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reverted.assignment_status, "ENDED");
    assert_eq!(reverted.end_date, Some(date(2025, 6, 30)));

    let activated = PositionAssignment::find_by_id(&pool, tenant, due.assignment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(activated.assignment_status, "ACTIVE");
}
