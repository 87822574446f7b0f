//! # Position Mutations
//!
//! Versioned writes against `positions`. The temporal mechanics mirror
//! organization units; positions additionally anchor to an owning
//! organization that must be ACTIVE at the version's effective date.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, Actor, AuditEvent, EventType, OperationContext};
use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::locking::acquire_entity_lock;
use crate::models::{NewPosition, Position};
use crate::state_machine::{OccupancyStatus, UnitStatus};
use crate::timeline::{recalculator, TimelineKind};
use crate::validation;

use super::Mutated;

const RESOURCE_TYPE: &str = "position";

/// Request to create a brand-new position.
#[derive(Debug, Clone)]
pub struct CreatePositionRequest {
    pub code: String,
    pub organization_code: String,
    pub title: String,
    pub status: UnitStatus,
    pub job_family_group_code: Option<String>,
    pub job_family_group_record_id: Option<Uuid>,
    pub job_family_code: Option<String>,
    pub job_family_record_id: Option<Uuid>,
    pub job_role_code: Option<String>,
    pub job_role_record_id: Option<Uuid>,
    pub job_level_code: Option<String>,
    pub job_level_record_id: Option<Uuid>,
    pub employment_type: String,
    pub headcount_capacity: f64,
    pub description: String,
    pub effective_date: NaiveDate,
    pub change_reason: Option<String>,
}

/// Request to add a version to a position timeline. Unset attributes
/// inherit from the latest non-deleted version.
#[derive(Debug, Clone, Default)]
pub struct InsertPositionVersionRequest {
    pub organization_code: Option<String>,
    pub title: Option<String>,
    pub employment_type: Option<String>,
    pub headcount_capacity: Option<f64>,
    pub description: Option<String>,
    pub change_reason: Option<String>,
}

pub struct PositionService {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PositionService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new position with its first version.
    pub async fn create_position(
        &self,
        tenant_id: Uuid,
        request: CreatePositionRequest,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<Position>> {
        if request.headcount_capacity <= 0.0 {
            return Err(EngineError::InvalidRequest(
                "headcount_capacity must be greater than zero".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, &request.code).await?;

        validation::validate_new_position_code(&mut tx, tenant_id, &request.code).await?;
        validation::validate_parent_available_at(
            &mut tx,
            tenant_id,
            &request.organization_code,
            request.effective_date,
        )
        .await?;

        let inserted = Position::create(
            &mut *tx,
            &NewPosition {
                tenant_id,
                code: request.code.clone(),
                organization_code: request.organization_code.clone(),
                title: request.title.clone(),
                status: request.status,
                occupancy_status: OccupancyStatus::Vacant,
                job_family_group_code: request.job_family_group_code.clone(),
                job_family_group_record_id: request.job_family_group_record_id,
                job_family_code: request.job_family_code.clone(),
                job_family_record_id: request.job_family_record_id,
                job_role_code: request.job_role_code.clone(),
                job_role_record_id: request.job_role_record_id,
                job_level_code: request.job_level_code.clone(),
                job_level_record_id: request.job_level_record_id,
                employment_type: request.employment_type.clone(),
                headcount_capacity: request.headcount_capacity,
                headcount_in_use: 0.0,
                description: request.description.clone(),
                effective_date: request.effective_date,
                change_reason: request.change_reason.clone(),
            },
        )
        .await?;

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::Position,
            tenant_id,
            &request.code,
            self.clock.today(),
        )
        .await?;

        let refreshed = self.reload(&mut tx, tenant_id, inserted.record_id).await?;

        let event = AuditEvent::new(
            EventType::Create,
            RESOURCE_TYPE,
            &request.code,
            "create_position",
            self.clock.now(),
        )
        .with_record_id(refreshed.record_id)
        .with_entity_code(&request.code)
        .with_after(refreshed.audit_snapshot());
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            code = %refreshed.code,
            record_id = %refreshed.record_id,
            "position created"
        );

        Ok(Mutated::new(refreshed))
    }

    /// Add a planned or historical version to an existing position.
    pub async fn insert_version(
        &self,
        tenant_id: Uuid,
        code: &str,
        effective_date: NaiveDate,
        request: InsertPositionVersionRequest,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<Position>> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, code).await?;

        let base = Position::latest_version(&mut *tx, tenant_id, code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("position {code}")))?;

        if Position::version_at_point(&mut *tx, tenant_id, code, effective_date)
            .await?
            .is_some()
        {
            return Err(EngineError::TemporalPointConflict { effective_date });
        }

        let organization_code = request
            .organization_code
            .unwrap_or_else(|| base.organization_code.clone());
        if organization_code != base.organization_code {
            validation::validate_parent_available_at(
                &mut tx,
                tenant_id,
                &organization_code,
                effective_date,
            )
            .await?;
        }

        let capacity = request.headcount_capacity.unwrap_or(base.headcount_capacity);
        if capacity <= 0.0 {
            return Err(EngineError::InvalidRequest(
                "headcount_capacity must be greater than zero".to_string(),
            ));
        }

        let inserted = Position::create(
            &mut *tx,
            &NewPosition {
                tenant_id,
                code: code.to_string(),
                organization_code,
                title: request.title.unwrap_or_else(|| base.title.clone()),
                status: base.unit_status()?,
                occupancy_status: base
                    .occupancy_status
                    .parse()
                    .map_err(EngineError::InvalidRequest)?,
                job_family_group_code: base.job_family_group_code.clone(),
                job_family_group_record_id: base.job_family_group_record_id,
                job_family_code: base.job_family_code.clone(),
                job_family_record_id: base.job_family_record_id,
                job_role_code: base.job_role_code.clone(),
                job_role_record_id: base.job_role_record_id,
                job_level_code: base.job_level_code.clone(),
                job_level_record_id: base.job_level_record_id,
                employment_type: request
                    .employment_type
                    .unwrap_or_else(|| base.employment_type.clone()),
                headcount_capacity: capacity,
                headcount_in_use: base.headcount_in_use,
                description: request
                    .description
                    .unwrap_or_else(|| base.description.clone()),
                effective_date,
                change_reason: request.change_reason,
            },
        )
        .await?;

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::Position,
            tenant_id,
            code,
            self.clock.today(),
        )
        .await?;

        let refreshed = self.reload(&mut tx, tenant_id, inserted.record_id).await?;

        let event = AuditEvent::new(
            EventType::Update,
            RESOURCE_TYPE,
            code,
            "insert_version",
            self.clock.now(),
        )
        .with_record_id(refreshed.record_id)
        .with_entity_code(code)
        .with_before(base.audit_snapshot())
        .with_after(refreshed.audit_snapshot());
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        Ok(Mutated::new(refreshed))
    }

    /// Move one version to a new effective date, replacing the record.
    pub async fn update_version_effective_date(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        new_effective_date: NaiveDate,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<Position>> {
        let mut tx = self.pool.begin().await?;

        let located = Position::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("position version {record_id}")))?;

        acquire_entity_lock(&mut tx, tenant_id, &located.code).await?;

        // re-read under the lock; the first read only resolves the lock key
        let existing = Position::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("position version {record_id}")))?;

        if let Some(occupant) =
            Position::version_at_point(&mut *tx, tenant_id, &existing.code, new_effective_date)
                .await?
        {
            if occupant.record_id != record_id {
                return Err(EngineError::TemporalPointConflict {
                    effective_date: new_effective_date,
                });
            }
        }

        Position::soft_delete(&mut *tx, tenant_id, record_id).await?;

        let replacement = Position::create(
            &mut *tx,
            &NewPosition {
                tenant_id,
                code: existing.code.clone(),
                organization_code: existing.organization_code.clone(),
                title: existing.title.clone(),
                status: existing.unit_status()?,
                occupancy_status: existing
                    .occupancy_status
                    .parse()
                    .map_err(EngineError::InvalidRequest)?,
                job_family_group_code: existing.job_family_group_code.clone(),
                job_family_group_record_id: existing.job_family_group_record_id,
                job_family_code: existing.job_family_code.clone(),
                job_family_record_id: existing.job_family_record_id,
                job_role_code: existing.job_role_code.clone(),
                job_role_record_id: existing.job_role_record_id,
                job_level_code: existing.job_level_code.clone(),
                job_level_record_id: existing.job_level_record_id,
                employment_type: existing.employment_type.clone(),
                headcount_capacity: existing.headcount_capacity,
                headcount_in_use: existing.headcount_in_use,
                description: existing.description.clone(),
                effective_date: new_effective_date,
                change_reason: existing.change_reason.clone(),
            },
        )
        .await?;

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::Position,
            tenant_id,
            &existing.code,
            self.clock.today(),
        )
        .await?;

        let refreshed = self.reload(&mut tx, tenant_id, replacement.record_id).await?;

        let event = AuditEvent::new(
            EventType::Update,
            RESOURCE_TYPE,
            &existing.code,
            "update_version_effective_date",
            self.clock.now(),
        )
        .with_record_id(refreshed.record_id)
        .with_entity_code(&existing.code)
        .with_before(existing.audit_snapshot())
        .with_after(refreshed.audit_snapshot());
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        Ok(Mutated::new(refreshed))
    }

    /// Soft-delete one version and repair the timeline around it.
    pub async fn delete_version(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let located = Position::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("position version {record_id}")))?;

        acquire_entity_lock(&mut tx, tenant_id, &located.code).await?;

        // re-read under the lock; the first read only resolves the lock key
        let existing = Position::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("position version {record_id}")))?;

        Position::soft_delete(&mut *tx, tenant_id, record_id).await?;

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::Position,
            tenant_id,
            &existing.code,
            self.clock.today(),
        )
        .await?;

        let event = AuditEvent::new(
            EventType::Delete,
            RESOURCE_TYPE,
            &existing.code,
            "delete_version",
            self.clock.now(),
        )
        .with_record_id(record_id)
        .with_entity_code(&existing.code)
        .with_before(existing.audit_snapshot());
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Record a status change effective from a given date, with the same
    /// merge semantics as organization units.
    pub async fn change_status(
        &self,
        tenant_id: Uuid,
        code: &str,
        target: UnitStatus,
        effective_date: NaiveDate,
        change_reason: Option<String>,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<Position>> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, code).await?;

        let reference = match Position::find_current(&mut *tx, tenant_id, code).await? {
            Some(current) => current,
            None => Position::latest_version(&mut *tx, tenant_id, code)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("position {code}")))?,
        };

        validation::validate_status_transition(reference.unit_status()?, target)?;

        if reference.unit_status()? == target {
            tx.commit().await?;
            return Ok(Mutated::new(reference));
        }

        let before_snapshot = reference.audit_snapshot();

        let target_record =
            match Position::version_at_point(&mut *tx, tenant_id, code, effective_date).await? {
                Some(occupant) => {
                    sqlx::query(
                        r#"
                        UPDATE positions
                        SET status = $3, change_reason = COALESCE($4, change_reason),
                            updated_at = NOW()
                        WHERE tenant_id = $1 AND record_id = $2
                        "#,
                    )
                    .bind(tenant_id)
                    .bind(occupant.record_id)
                    .bind(target.to_string())
                    .bind(&change_reason)
                    .execute(&mut *tx)
                    .await?;
                    occupant.record_id
                }
                None => {
                    let inserted = Position::create(
                        &mut *tx,
                        &NewPosition {
                            tenant_id,
                            code: code.to_string(),
                            organization_code: reference.organization_code.clone(),
                            title: reference.title.clone(),
                            status: target,
                            occupancy_status: reference
                                .occupancy_status
                                .parse()
                                .map_err(EngineError::InvalidRequest)?,
                            job_family_group_code: reference.job_family_group_code.clone(),
                            job_family_group_record_id: reference.job_family_group_record_id,
                            job_family_code: reference.job_family_code.clone(),
                            job_family_record_id: reference.job_family_record_id,
                            job_role_code: reference.job_role_code.clone(),
                            job_role_record_id: reference.job_role_record_id,
                            job_level_code: reference.job_level_code.clone(),
                            job_level_record_id: reference.job_level_record_id,
                            employment_type: reference.employment_type.clone(),
                            headcount_capacity: reference.headcount_capacity,
                            headcount_in_use: reference.headcount_in_use,
                            description: reference.description.clone(),
                            effective_date,
                            change_reason,
                        },
                    )
                    .await?;
                    inserted.record_id
                }
            };

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::Position,
            tenant_id,
            code,
            self.clock.today(),
        )
        .await?;

        let refreshed = self.reload(&mut tx, tenant_id, target_record).await?;

        let event = AuditEvent::new(
            EventType::StatusChange,
            RESOURCE_TYPE,
            code,
            "change_status",
            self.clock.now(),
        )
        .with_record_id(refreshed.record_id)
        .with_entity_code(code)
        .with_before(before_snapshot)
        .with_after(refreshed.audit_snapshot());
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        Ok(Mutated::new(refreshed))
    }

    /// Full ordered timeline for one position.
    pub async fn timeline(&self, tenant_id: Uuid, code: &str) -> Result<Vec<Position>> {
        Position::timeline(&self.pool, tenant_id, code).await
    }

    /// Current positions attached to one organization unit.
    pub async fn list_for_organization(
        &self,
        tenant_id: Uuid,
        organization_code: &str,
    ) -> Result<Vec<Position>> {
        Position::list_for_organization(&self.pool, tenant_id, organization_code).await
    }

    /// Recompute one position's timeline outside a mutation.
    pub async fn recalculate_timeline(&self, tenant_id: Uuid, code: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, code).await?;
        let plan = recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::Position,
            tenant_id,
            code,
            self.clock.today(),
        )
        .await?;
        tx.commit().await?;

        crate::logging::log_timeline_operation(
            "recalculate_timeline",
            &tenant_id.to_string(),
            code,
            Some(plan.len()),
            "ok",
            None,
        );
        Ok(())
    }

    async fn reload(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<Position> {
        Position::find_by_record_id(&mut **tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("position version {record_id}")))
    }
}
