//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use org_temporal_core::audit::{Actor, OperationContext};
use org_temporal_core::clock::FixedClock;
use org_temporal_core::services::{
    AssignmentService, CreateOrganizationRequest, CreatePositionRequest, OrganizationService,
    PositionService,
};
use org_temporal_core::state_machine::UnitStatus;
use org_temporal_core::{OrganizationUnit, Position};

/// The tests pin the calendar to this date.
pub fn today() -> NaiveDate {
    date(2025, 8, 15)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::on_date(today()))
}

pub fn org_service(pool: &PgPool) -> OrganizationService {
    OrganizationService::with_clock(pool.clone(), fixed_clock())
}

pub fn position_service(pool: &PgPool) -> PositionService {
    PositionService::with_clock(pool.clone(), fixed_clock())
}

pub fn assignment_service(pool: &PgPool) -> AssignmentService {
    AssignmentService::with_clock(pool.clone(), fixed_clock())
}

pub fn actor() -> Actor {
    Actor::user("test-operator", Some("Test Operator".to_string()))
}

pub fn context() -> OperationContext {
    OperationContext {
        request_id: Some("req-1".to_string()),
        correlation_id: Some("corr-1".to_string()),
        operation_reason: None,
    }
}

pub fn org_request(
    code: &str,
    parent_code: Option<&str>,
    effective_date: NaiveDate,
) -> CreateOrganizationRequest {
    CreateOrganizationRequest {
        code: code.to_string(),
        name: format!("{code} Unit"),
        unit_type: "DEPARTMENT".to_string(),
        parent_code: parent_code.map(str::to_string),
        status: UnitStatus::Active,
        sort_order: 0,
        description: String::new(),
        effective_date,
        change_reason: None,
    }
}

pub async fn create_org(
    service: &OrganizationService,
    tenant_id: Uuid,
    code: &str,
    parent_code: Option<&str>,
    effective_date: NaiveDate,
) -> OrganizationUnit {
    service
        .create_organization(
            tenant_id,
            org_request(code, parent_code, effective_date),
            &actor(),
            &context(),
        )
        .await
        .expect("organization creation should succeed")
        .entity
}

pub fn position_request(
    code: &str,
    organization_code: &str,
    capacity: f64,
    effective_date: NaiveDate,
) -> CreatePositionRequest {
    CreatePositionRequest {
        code: code.to_string(),
        organization_code: organization_code.to_string(),
        title: format!("{code} Title"),
        status: UnitStatus::Active,
        job_family_group_code: None,
        job_family_group_record_id: None,
        job_family_code: None,
        job_family_record_id: None,
        job_role_code: None,
        job_role_record_id: None,
        job_level_code: None,
        job_level_record_id: None,
        employment_type: "FULL_TIME".to_string(),
        headcount_capacity: capacity,
        description: String::new(),
        effective_date,
        change_reason: None,
    }
}

pub async fn create_position(
    service: &PositionService,
    tenant_id: Uuid,
    code: &str,
    organization_code: &str,
    capacity: f64,
    effective_date: NaiveDate,
) -> Position {
    service
        .create_position(
            tenant_id,
            position_request(code, organization_code, capacity, effective_date),
            &actor(),
            &context(),
        )
        .await
        .expect("position creation should succeed")
        .entity
}
