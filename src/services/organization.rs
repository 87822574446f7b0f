//! # Organization Unit Mutations
//!
//! Versioned writes against `organization_units`. Every public operation
//! serializes on the entity's advisory lock, revalidates inside the
//! transaction, recalculates the timeline, and writes its audit entry before
//! committing.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, Actor, AuditEvent, EventType, OperationContext};
use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::hierarchy::{self, walker};
use crate::locking::acquire_entity_lock;
use crate::models::{NewOrganizationUnit, OrganizationUnit};
use crate::state_machine::UnitStatus;
use crate::timeline::{recalculator, TimelineKind};
use crate::validation;

use super::Mutated;

const RESOURCE_TYPE: &str = "organization_unit";

/// Request to create a brand-new organization unit.
#[derive(Debug, Clone)]
pub struct CreateOrganizationRequest {
    pub code: String,
    pub name: String,
    pub unit_type: String,
    pub parent_code: Option<String>,
    pub status: UnitStatus,
    pub sort_order: i32,
    pub description: String,
    pub effective_date: NaiveDate,
    pub change_reason: Option<String>,
}

/// Request to add a version to an existing timeline. Unset attributes
/// inherit from the latest non-deleted version.
#[derive(Debug, Clone, Default)]
pub struct InsertVersionRequest {
    pub name: Option<String>,
    pub unit_type: Option<String>,
    pub parent_code: Option<String>,
    pub sort_order: Option<i32>,
    pub description: Option<String>,
    pub change_reason: Option<String>,
}

/// In-place patch of the current version, guarded by an If-Match token.
#[derive(Debug, Clone, Default)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub parent_code: Option<Option<String>>,
    pub status: Option<UnitStatus>,
    pub sort_order: Option<i32>,
    pub description: Option<String>,
    pub change_reason: Option<String>,
}

pub struct OrganizationService {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl OrganizationService {
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

    /// Create a new organization unit with its first version.
    pub async fn create_organization(
        &self,
        tenant_id: Uuid,
        request: CreateOrganizationRequest,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<OrganizationUnit>> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, &request.code).await?;

        validation::validate_new_organization_code(&mut tx, tenant_id, &request.code).await?;

        let mut advisory = None;
        let parent = match &request.parent_code {
            Some(parent_code) => {
                advisory = validation::validate_parent_rules(
                    &mut tx,
                    tenant_id,
                    &request.code,
                    parent_code,
                    request.effective_date,
                )
                .await?;
                OrganizationUnit::find_at_date(
                    &mut *tx,
                    tenant_id,
                    parent_code,
                    request.effective_date,
                )
                .await?
            }
            None => None,
        };

        let (code_path, name_path, level) =
            walker::child_paths(parent.as_ref(), &request.code, &request.name);

        let inserted = OrganizationUnit::create(
            &mut *tx,
            &NewOrganizationUnit {
                tenant_id,
                code: request.code.clone(),
                parent_code: request.parent_code.clone(),
                name: request.name.clone(),
                unit_type: request.unit_type.clone(),
                status: request.status,
                level,
                code_path,
                name_path,
                sort_order: request.sort_order,
                description: request.description.clone(),
                effective_date: request.effective_date,
                change_reason: request.change_reason.clone(),
            },
        )
        .await?;

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::OrganizationUnit,
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
            "create_organization",
            self.clock.now(),
        )
        .with_record_id(refreshed.record_id)
        .with_entity_code(&request.code)
        .with_after(refreshed.audit_snapshot())
        .with_business_context(serde_json::json!({ "advisory": advisory }));
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            code = %refreshed.code,
            record_id = %refreshed.record_id,
            "organization created"
        );

        Ok(Mutated::with_advisory(refreshed, advisory))
    }

    /// Add a planned or historical version to an existing organization.
    pub async fn insert_version(
        &self,
        tenant_id: Uuid,
        code: &str,
        effective_date: NaiveDate,
        request: InsertVersionRequest,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<OrganizationUnit>> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, code).await?;

        let base = OrganizationUnit::latest_version(&mut *tx, tenant_id, code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization {code}")))?;

        if OrganizationUnit::version_at_point(&mut *tx, tenant_id, code, effective_date)
            .await?
            .is_some()
        {
            return Err(EngineError::TemporalPointConflict { effective_date });
        }

        let name = request.name.unwrap_or_else(|| base.name.clone());
        let parent_code = request.parent_code.or_else(|| base.parent_code.clone());
        let parent_changed = parent_code != base.parent_code;

        let mut advisory = None;
        if let Some(new_parent) = &parent_code {
            if parent_changed {
                advisory = validation::validate_parent_rules(
                    &mut tx,
                    tenant_id,
                    code,
                    new_parent,
                    effective_date,
                )
                .await?;
            }
        }

        let parent = match &parent_code {
            Some(parent_code) => {
                OrganizationUnit::find_at_date(&mut *tx, tenant_id, parent_code, effective_date)
                    .await?
            }
            None => None,
        };
        let (code_path, name_path, level) = walker::child_paths(parent.as_ref(), code, &name);

        let inserted = OrganizationUnit::create(
            &mut *tx,
            &NewOrganizationUnit {
                tenant_id,
                code: code.to_string(),
                parent_code,
                name,
                unit_type: request.unit_type.unwrap_or_else(|| base.unit_type.clone()),
                status: base.unit_status()?,
                level,
                code_path,
                name_path,
                sort_order: request.sort_order.unwrap_or(base.sort_order),
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
            TimelineKind::OrganizationUnit,
            tenant_id,
            code,
            self.clock.today(),
        )
        .await?;

        let refreshed = self.reload(&mut tx, tenant_id, inserted.record_id).await?;

        // a new current version with a different parent moves the subtree
        if parent_changed && refreshed.is_current {
            walker::update_hierarchy_paths(&mut tx, tenant_id, code).await?;
        }

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
        .with_after(refreshed.audit_snapshot())
        .with_business_context(serde_json::json!({ "advisory": advisory }));
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        Ok(Mutated::with_advisory(refreshed, advisory))
    }

    /// Move one version to a new effective date. The old record is
    /// soft-deleted and replaced so the record id history stays traceable.
    pub async fn update_version_effective_date(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        new_effective_date: NaiveDate,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<OrganizationUnit>> {
        let mut tx = self.pool.begin().await?;

        let located = OrganizationUnit::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization version {record_id}")))?;

        acquire_entity_lock(&mut tx, tenant_id, &located.code).await?;

        // re-read under the lock; the first read only resolves the lock key
        let existing = OrganizationUnit::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization version {record_id}")))?;

        if let Some(occupant) = OrganizationUnit::version_at_point(
            &mut *tx,
            tenant_id,
            &existing.code,
            new_effective_date,
        )
        .await?
        {
            if occupant.record_id != record_id {
                return Err(EngineError::TemporalPointConflict {
                    effective_date: new_effective_date,
                });
            }
        }

        OrganizationUnit::soft_delete(&mut *tx, tenant_id, record_id).await?;

        let replacement = OrganizationUnit::create(
            &mut *tx,
            &NewOrganizationUnit {
                tenant_id,
                code: existing.code.clone(),
                parent_code: existing.parent_code.clone(),
                name: existing.name.clone(),
                unit_type: existing.unit_type.clone(),
                status: existing.unit_status()?,
                level: existing.level,
                code_path: existing.code_path.clone(),
                name_path: existing.name_path.clone(),
                sort_order: existing.sort_order,
                description: existing.description.clone(),
                effective_date: new_effective_date,
                change_reason: existing.change_reason.clone(),
            },
        )
        .await?;

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::OrganizationUnit,
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

        let located = OrganizationUnit::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization version {record_id}")))?;

        acquire_entity_lock(&mut tx, tenant_id, &located.code).await?;

        // re-read under the lock; the first read only resolves the lock key
        let existing = OrganizationUnit::find_by_record_id(&mut *tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization version {record_id}")))?;

        let timeline = OrganizationUnit::timeline(&mut *tx, tenant_id, &existing.code).await?;
        if timeline.len() == 1 {
            let child_count =
                OrganizationUnit::non_deleted_child_count(&mut *tx, tenant_id, &existing.code)
                    .await?;
            if child_count > 0 {
                return Err(EngineError::OrganizationHasChildren {
                    code: existing.code.clone(),
                    child_count,
                });
            }
        }

        OrganizationUnit::soft_delete(&mut *tx, tenant_id, record_id).await?;

        recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::OrganizationUnit,
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

        info!(
            tenant_id = %tenant_id,
            code = %existing.code,
            record_id = %record_id,
            "organization version deleted"
        );

        Ok(())
    }

    /// Suspend an organization from `effective_date`.
    pub async fn suspend(
        &self,
        tenant_id: Uuid,
        code: &str,
        effective_date: NaiveDate,
        change_reason: Option<String>,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<OrganizationUnit>> {
        self.change_status(
            tenant_id,
            code,
            UnitStatus::Inactive,
            effective_date,
            change_reason,
            actor,
            context,
        )
        .await
    }

    /// Reactivate a suspended organization from `effective_date`.
    pub async fn activate(
        &self,
        tenant_id: Uuid,
        code: &str,
        effective_date: NaiveDate,
        change_reason: Option<String>,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<OrganizationUnit>> {
        self.change_status(
            tenant_id,
            code,
            UnitStatus::Active,
            effective_date,
            change_reason,
            actor,
            context,
        )
        .await
    }

    /// Record a status change effective from a given date. Idempotent when
    /// the reference version already carries the target status; merges in
    /// place when a version already sits at the date; otherwise inserts a
    /// new inheriting version.
    pub async fn change_status(
        &self,
        tenant_id: Uuid,
        code: &str,
        target: UnitStatus,
        effective_date: NaiveDate,
        change_reason: Option<String>,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<OrganizationUnit>> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, code).await?;

        let reference = match OrganizationUnit::find_current(&mut *tx, tenant_id, code).await? {
            Some(current) => current,
            None => OrganizationUnit::latest_version(&mut *tx, tenant_id, code)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("organization {code}")))?,
        };

        validation::validate_status_transition(reference.unit_status()?, target)?;

        if reference.unit_status()? == target {
            // repeated request, nothing to change and nothing to audit
            tx.commit().await?;
            return Ok(Mutated::new(reference));
        }

        let before_snapshot = reference.audit_snapshot();

        let target_record = match OrganizationUnit::version_at_point(
            &mut *tx,
            tenant_id,
            code,
            effective_date,
        )
        .await?
        {
            Some(occupant) => {
                sqlx::query(
                    r#"
                    UPDATE organization_units
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
                let inserted = OrganizationUnit::create(
                    &mut *tx,
                    &NewOrganizationUnit {
                        tenant_id,
                        code: code.to_string(),
                        parent_code: reference.parent_code.clone(),
                        name: reference.name.clone(),
                        unit_type: reference.unit_type.clone(),
                        status: target,
                        level: reference.level,
                        code_path: reference.code_path.clone(),
                        name_path: reference.name_path.clone(),
                        sort_order: reference.sort_order,
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
            TimelineKind::OrganizationUnit,
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

    /// In-place update of the current version, guarded by an If-Match
    /// revision token (the caller's view of the current record id).
    pub async fn update_current_version(
        &self,
        tenant_id: Uuid,
        code: &str,
        expected_record_id: Uuid,
        request: UpdateOrganizationRequest,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<Mutated<OrganizationUnit>> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, code).await?;

        let current = OrganizationUnit::find_current(&mut *tx, tenant_id, code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization {code}")))?;

        if current.record_id != expected_record_id {
            return Err(EngineError::PreconditionFailed {
                expected: current.record_id,
                supplied: expected_record_id,
            });
        }

        let new_name = request.name.clone().unwrap_or_else(|| current.name.clone());
        let new_parent = match &request.parent_code {
            Some(parent) => parent.clone(),
            None => current.parent_code.clone(),
        };
        let new_status = request.status.unwrap_or(current.unit_status()?);
        let parent_changed = new_parent != current.parent_code;
        let name_changed = new_name != current.name;

        // an in-place patch must not bypass delete_version: that path owns
        // deleted_at, the children guard, and the timeline repair
        if new_status == UnitStatus::Deleted {
            return Err(EngineError::InvalidRequest(
                "status cannot be patched to DELETED, use delete_version".to_string(),
            ));
        }
        validation::validate_status_transition(current.unit_status()?, new_status)?;

        let mut advisory = None;
        if parent_changed {
            if let Some(parent_code) = &new_parent {
                advisory = validation::validate_parent_rules(
                    &mut tx,
                    tenant_id,
                    code,
                    parent_code,
                    current.effective_date.max(self.clock.today()),
                )
                .await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE organization_units
            SET name = $3, parent_code = $4, status = $5,
                sort_order = $6, description = $7,
                change_reason = COALESCE($8, change_reason), updated_at = NOW()
            WHERE tenant_id = $1 AND record_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(current.record_id)
        .bind(&new_name)
        .bind(&new_parent)
        .bind(new_status.to_string())
        .bind(request.sort_order.unwrap_or(current.sort_order))
        .bind(
            request
                .description
                .clone()
                .unwrap_or_else(|| current.description.clone()),
        )
        .bind(&request.change_reason)
        .execute(&mut *tx)
        .await?;

        if parent_changed || name_changed {
            walker::update_hierarchy_paths(&mut tx, tenant_id, code).await?;
        }

        let refreshed = self.reload(&mut tx, tenant_id, current.record_id).await?;

        let event = AuditEvent::new(
            EventType::Update,
            RESOURCE_TYPE,
            code,
            "update_current_version",
            self.clock.now(),
        )
        .with_record_id(refreshed.record_id)
        .with_entity_code(code)
        .with_before(current.audit_snapshot())
        .with_after(refreshed.audit_snapshot())
        .with_business_context(serde_json::json!({ "advisory": advisory }));
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        Ok(Mutated::with_advisory(refreshed, advisory))
    }

    /// Full ordered timeline for one organization.
    pub async fn timeline(&self, tenant_id: Uuid, code: &str) -> Result<Vec<OrganizationUnit>> {
        OrganizationUnit::timeline(&self.pool, tenant_id, code).await
    }

    /// Recompute one organization's timeline outside a mutation, for the
    /// consistency sweep.
    pub async fn recalculate_timeline(&self, tenant_id: Uuid, code: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, code).await?;
        let plan = recalculator::recalculate_in_tx(
            &mut tx,
            TimelineKind::OrganizationUnit,
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

    /// Current ancestor chain for one organization, nearest parent first.
    pub async fn ancestor_chain(&self, tenant_id: Uuid, code: &str) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        hierarchy::ancestor_chain(&mut conn, tenant_id, code).await
    }

    /// Current versions of the direct children of one organization.
    pub async fn children(&self, tenant_id: Uuid, code: &str) -> Result<Vec<OrganizationUnit>> {
        OrganizationUnit::current_children(&self.pool, tenant_id, code).await
    }

    /// Current versions of the whole subtree below one organization,
    /// shallowest first.
    pub async fn descendants(&self, tenant_id: Uuid, code: &str) -> Result<Vec<OrganizationUnit>> {
        let current = OrganizationUnit::find_current(&self.pool, tenant_id, code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization {code}")))?;
        OrganizationUnit::current_descendants(&self.pool, tenant_id, &current.code_path).await
    }

    async fn reload(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<OrganizationUnit> {
        OrganizationUnit::find_by_record_id(&mut **tx, tenant_id, record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("organization version {record_id}")))
    }
}
