//! # Assignment Ledger
//!
//! Occupancy of positions: opening, closing, and adjusting assignments, with
//! the FTE ledger enforced against position capacity and the position's
//! occupancy status kept in step.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{self, Actor, AuditEvent, EventType, OperationContext};
use crate::clock::{Clock, SystemClock};
use crate::constants::{AUTO_REVERT_REASON, FTE_EPSILON};
use crate::error::{EngineError, Result};
use crate::locking::acquire_entity_lock;
use crate::models::{NewPositionAssignment, Position, PositionAssignment};
use crate::state_machine::{AssignmentStatus, AssignmentType, OccupancyStatus};

const RESOURCE_TYPE: &str = "position_assignment";

/// Request to open an assignment against a position.
#[derive(Debug, Clone)]
pub struct FillPositionRequest {
    pub position_code: String,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub employee_number: Option<String>,
    pub assignment_type: AssignmentType,
    pub fte: f64,
    pub effective_date: NaiveDate,
    pub acting_until: Option<NaiveDate>,
    pub auto_revert: bool,
    pub notes: Option<String>,
}

/// Mutable-field patch for an open assignment.
#[derive(Debug, Clone, Default)]
pub struct UpdateAssignmentRequest {
    pub fte: Option<f64>,
    pub acting_until: Option<Option<NaiveDate>>,
    pub auto_revert: Option<bool>,
    pub notes: Option<Option<String>>,
}

/// Outcome of one auto-revert sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    pub processed: usize,
    pub failed: usize,
}

pub struct AssignmentService {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl AssignmentService {
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

    /// Open an assignment. The FTE ledger is checked against the position's
    /// capacity regardless of start date; future-dated assignments start
    /// PENDING and do not consume capacity until their effective date.
    pub async fn fill_position(
        &self,
        tenant_id: Uuid,
        request: FillPositionRequest,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<PositionAssignment> {
        if request.fte <= 0.0 {
            return Err(EngineError::InvalidRequest(
                "fte must be greater than zero".to_string(),
            ));
        }
        if request.auto_revert
            && (request.assignment_type != AssignmentType::Acting
                || request.acting_until.is_none())
        {
            return Err(EngineError::InvalidRequest(
                "auto_revert requires an ACTING assignment with acting_until set".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        acquire_entity_lock(&mut tx, tenant_id, &request.position_code).await?;

        let position = Position::find_current(&mut *tx, tenant_id, &request.position_code)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("position {}", request.position_code))
            })?;

        let status = if request.effective_date <= self.clock.today() {
            AssignmentStatus::Active
        } else {
            AssignmentStatus::Pending
        };

        // the check runs for PENDING fills too: a future assignment that
        // cannot fit against today's active FTE must not be accepted
        let in_use = PositionAssignment::active_fte_sum(
            &mut *tx,
            tenant_id,
            &request.position_code,
            None,
        )
        .await?;
        if in_use + request.fte > position.headcount_capacity + FTE_EPSILON {
            return Err(EngineError::InvalidHeadcount {
                position_code: request.position_code.clone(),
                capacity: position.headcount_capacity,
                current_usage: in_use,
                requested: request.fte,
            });
        }

        let assignment = PositionAssignment::create(
            &mut *tx,
            &NewPositionAssignment {
                tenant_id,
                position_code: request.position_code.clone(),
                position_record_id: position.record_id,
                employee_id: request.employee_id,
                employee_name: request.employee_name.clone(),
                employee_number: request.employee_number.clone(),
                assignment_type: request.assignment_type,
                assignment_status: status,
                fte: request.fte,
                effective_date: request.effective_date,
                acting_until: request.acting_until,
                auto_revert: request.auto_revert,
                notes: request.notes.clone(),
            },
        )
        .await?;

        self.refresh_occupancy(&mut tx, tenant_id, &request.position_code)
            .await?;

        let event = AuditEvent::new(
            EventType::Assignment,
            RESOURCE_TYPE,
            &assignment.assignment_id.to_string(),
            "fill_position",
            self.clock.now(),
        )
        .with_entity_code(&request.position_code)
        .with_after(assignment.audit_snapshot());
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            position_code = %request.position_code,
            assignment_id = %assignment.assignment_id,
            fte = request.fte,
            "position filled"
        );

        Ok(assignment)
    }

    /// Close an assignment as of `end_date`.
    pub async fn vacate_position(
        &self,
        tenant_id: Uuid,
        assignment_id: Uuid,
        end_date: NaiveDate,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<PositionAssignment> {
        let mut tx = self.pool.begin().await?;

        let located = PositionAssignment::find_by_id(&mut *tx, tenant_id, assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("assignment {assignment_id}")))?;

        acquire_entity_lock(&mut tx, tenant_id, &located.position_code).await?;

        // re-read under the lock; the first read only resolves the lock key
        let existing = PositionAssignment::find_by_id(&mut *tx, tenant_id, assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("assignment {assignment_id}")))?;

        self.close_in_tx(&mut tx, tenant_id, &existing, end_date, actor, context)
            .await?;

        tx.commit().await?;

        PositionAssignment::find_by_id(&self.pool, tenant_id, assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("assignment {assignment_id}")))
    }

    /// Adjust an open assignment's mutable fields. FTE increases are
    /// re-checked against capacity.
    pub async fn update_assignment(
        &self,
        tenant_id: Uuid,
        assignment_id: Uuid,
        request: UpdateAssignmentRequest,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<PositionAssignment> {
        let mut tx = self.pool.begin().await?;

        let located = PositionAssignment::find_by_id(&mut *tx, tenant_id, assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("assignment {assignment_id}")))?;

        acquire_entity_lock(&mut tx, tenant_id, &located.position_code).await?;

        // re-read under the lock; the first read only resolves the lock key
        let existing = PositionAssignment::find_by_id(&mut *tx, tenant_id, assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("assignment {assignment_id}")))?;

        let status = existing.status()?;
        if !status.is_mutable() {
            return Err(EngineError::InvalidAssignmentState {
                assignment_id,
                status: existing.assignment_status.clone(),
            });
        }

        let new_fte = request.fte.unwrap_or(existing.fte);
        if new_fte <= 0.0 {
            return Err(EngineError::InvalidRequest(
                "fte must be greater than zero".to_string(),
            ));
        }
        let new_acting_until = request.acting_until.unwrap_or(existing.acting_until);
        let new_auto_revert = request.auto_revert.unwrap_or(existing.auto_revert);
        let new_notes = request.notes.unwrap_or_else(|| existing.notes.clone());

        if new_auto_revert {
            let assignment_type: AssignmentType = existing
                .assignment_type
                .parse()
                .map_err(EngineError::InvalidRequest)?;
            if assignment_type != AssignmentType::Acting || new_acting_until.is_none() {
                return Err(EngineError::InvalidRequest(
                    "auto_revert requires an ACTING assignment with acting_until set".to_string(),
                ));
            }
        }

        let fte_changed = (new_fte - existing.fte).abs() > FTE_EPSILON;
        if fte_changed && status.consumes_capacity() {
            let position = Position::find_current(&mut *tx, tenant_id, &existing.position_code)
                .await?
                .ok_or_else(|| {
                    EngineError::NotFound(format!("position {}", existing.position_code))
                })?;
            let others = PositionAssignment::active_fte_sum(
                &mut *tx,
                tenant_id,
                &existing.position_code,
                Some(assignment_id),
            )
            .await?;
            if others + new_fte > position.headcount_capacity + FTE_EPSILON {
                return Err(EngineError::InvalidHeadcount {
                    position_code: existing.position_code.clone(),
                    capacity: position.headcount_capacity,
                    current_usage: others,
                    requested: new_fte,
                });
            }
        }

        PositionAssignment::update_fields(
            &mut *tx,
            tenant_id,
            assignment_id,
            new_fte,
            new_acting_until,
            new_auto_revert,
            new_notes,
        )
        .await?;

        if fte_changed {
            self.refresh_occupancy(&mut tx, tenant_id, &existing.position_code)
                .await?;
        }

        let updated = PositionAssignment::find_by_id(&mut *tx, tenant_id, assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("assignment {assignment_id}")))?;

        let event = AuditEvent::new(
            EventType::Update,
            RESOURCE_TYPE,
            &assignment_id.to_string(),
            "update_assignment",
            self.clock.now(),
        )
        .with_entity_code(&existing.position_code)
        .with_before(existing.audit_snapshot())
        .with_after(updated.audit_snapshot());
        audit::log_event_in_tx(&mut tx, tenant_id, &event, actor, context).await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Sweep acting assignments whose `acting_until` has passed and close
    /// each one at that date. Individual failures are logged and skipped.
    pub async fn process_auto_reverts(&self) -> Result<SweepOutcome> {
        let today = self.clock.today();
        let candidates = PositionAssignment::auto_revert_candidates(&self.pool, today).await?;

        let mut outcome = SweepOutcome::default();
        let actor = Actor::system();
        let context = OperationContext {
            operation_reason: Some(AUTO_REVERT_REASON.to_string()),
            ..Default::default()
        };

        for candidate in candidates {
            // the candidate query filters on acting_until IS NOT NULL
            let Some(end_date) = candidate.acting_until else {
                continue;
            };

            let result = async {
                let mut tx = self.pool.begin().await?;
                acquire_entity_lock(&mut tx, candidate.tenant_id, &candidate.position_code)
                    .await?;
                self.close_in_tx(
                    &mut tx,
                    candidate.tenant_id,
                    &candidate,
                    end_date,
                    &actor,
                    &context,
                )
                .await?;
                tx.commit().await?;
                Ok::<(), EngineError>(())
            }
            .await;

            match result {
                Ok(()) => outcome.processed += 1,
                Err(err) => {
                    outcome.failed += 1;
                    error!(
                        tenant_id = %candidate.tenant_id,
                        assignment_id = %candidate.assignment_id,
                        position_code = %candidate.position_code,
                        error = %err,
                        "auto-revert failed for assignment, continuing sweep"
                    );
                    let event = AuditEvent::new(
                        EventType::System,
                        RESOURCE_TYPE,
                        &candidate.assignment_id.to_string(),
                        "auto_revert",
                        self.clock.now(),
                    )
                    .with_entity_code(&candidate.position_code)
                    .with_before(candidate.audit_snapshot());
                    audit::log_failure(
                        &self.pool,
                        candidate.tenant_id,
                        &event,
                        &actor,
                        &context,
                        &err,
                    )
                    .await;
                }
            }
        }

        crate::logging::log_sweep_operation(
            "auto_revert",
            outcome.processed,
            outcome.failed,
            None,
        );

        Ok(outcome)
    }

    /// Promote PENDING assignments whose effective date has arrived. Each
    /// candidate is activated under its position's lock with a fresh
    /// capacity check; on a violation the assignment stays PENDING and the
    /// sweep moves on.
    pub async fn activate_due_assignments(&self) -> Result<u64> {
        let today = self.clock.today();
        let candidates = PositionAssignment::due_pending(&self.pool, today).await?;

        let mut activated = 0u64;
        for candidate in candidates {
            let result = async {
                let mut tx = self.pool.begin().await?;
                acquire_entity_lock(&mut tx, candidate.tenant_id, &candidate.position_code)
                    .await?;

                let Some(position) = Position::find_current(
                    &mut *tx,
                    candidate.tenant_id,
                    &candidate.position_code,
                )
                .await?
                else {
                    return Ok::<bool, EngineError>(false);
                };

                // capacity may have been consumed since the fill was accepted
                let in_use = PositionAssignment::active_fte_sum(
                    &mut *tx,
                    candidate.tenant_id,
                    &candidate.position_code,
                    None,
                )
                .await?;
                if in_use + candidate.fte > position.headcount_capacity + FTE_EPSILON {
                    warn!(
                        tenant_id = %candidate.tenant_id,
                        assignment_id = %candidate.assignment_id,
                        position_code = %candidate.position_code,
                        capacity = position.headcount_capacity,
                        in_use,
                        fte = candidate.fte,
                        "capacity exhausted, assignment stays pending"
                    );
                    return Ok(false);
                }

                if !PositionAssignment::activate(
                    &mut *tx,
                    candidate.tenant_id,
                    candidate.assignment_id,
                )
                .await?
                {
                    return Ok(false);
                }
                self.refresh_occupancy(&mut tx, candidate.tenant_id, &candidate.position_code)
                    .await?;
                tx.commit().await?;
                Ok(true)
            }
            .await;

            match result {
                Ok(true) => activated += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(
                        tenant_id = %candidate.tenant_id,
                        assignment_id = %candidate.assignment_id,
                        position_code = %candidate.position_code,
                        error = %err,
                        "activation failed for assignment, continuing sweep"
                    );
                }
            }
        }

        Ok(activated)
    }

    /// Assignments of one position, newest first.
    pub async fn list_for_position(
        &self,
        tenant_id: Uuid,
        position_code: &str,
    ) -> Result<Vec<PositionAssignment>> {
        PositionAssignment::list_for_position(&self.pool, tenant_id, position_code).await
    }

    async fn close_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        assignment: &PositionAssignment,
        end_date: NaiveDate,
        actor: &Actor,
        context: &OperationContext,
    ) -> Result<()> {
        if !assignment.status()?.is_mutable() {
            return Err(EngineError::InvalidAssignmentState {
                assignment_id: assignment.assignment_id,
                status: assignment.assignment_status.clone(),
            });
        }
        if end_date < assignment.effective_date {
            return Err(EngineError::InvalidRequest(format!(
                "end date {end_date} precedes assignment effective date {}",
                assignment.effective_date
            )));
        }

        PositionAssignment::close(&mut **tx, tenant_id, assignment.assignment_id, end_date)
            .await?;

        self.refresh_occupancy(tx, tenant_id, &assignment.position_code)
            .await?;

        let closed = PositionAssignment::find_by_id(&mut **tx, tenant_id, assignment.assignment_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("assignment {}", assignment.assignment_id))
            })?;

        let event = AuditEvent::new(
            EventType::Assignment,
            RESOURCE_TYPE,
            &assignment.assignment_id.to_string(),
            "vacate_position",
            self.clock.now(),
        )
        .with_entity_code(&assignment.position_code)
        .with_before(assignment.audit_snapshot())
        .with_after(closed.audit_snapshot());
        audit::log_event_in_tx(tx, tenant_id, &event, actor, context).await?;

        Ok(())
    }

    /// Recompute `headcount_in_use` and the occupancy status of a position's
    /// current version from its ACTIVE assignments.
    async fn refresh_occupancy(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        position_code: &str,
    ) -> Result<()> {
        let Some(position) = Position::find_current(&mut **tx, tenant_id, position_code).await?
        else {
            return Ok(());
        };

        let in_use =
            PositionAssignment::active_fte_sum(&mut **tx, tenant_id, position_code, None).await?;
        let occupancy = OccupancyStatus::from_usage(in_use, position.headcount_capacity);

        Position::update_occupancy(&mut **tx, tenant_id, position.record_id, in_use, occupancy)
            .await?;

        Ok(())
    }
}
