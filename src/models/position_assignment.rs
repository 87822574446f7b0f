//! # PositionAssignment Model
//!
//! Assignments are not versioned: one row per occupancy, mutated in place
//! until closed. The FTE ledger of a position sums its ACTIVE rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::state_machine::{AssignmentStatus, AssignmentType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionAssignment {
    pub assignment_id: Uuid,
    pub tenant_id: Uuid,
    pub position_code: String,
    pub position_record_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub employee_number: Option<String>,
    pub assignment_type: String,
    pub assignment_status: String,
    pub fte: f64,
    pub effective_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub acting_until: Option<NaiveDate>,
    pub auto_revert: bool,
    pub is_current: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for opening a new assignment.
#[derive(Debug, Clone)]
pub struct NewPositionAssignment {
    pub tenant_id: Uuid,
    pub position_code: String,
    pub position_record_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub employee_number: Option<String>,
    pub assignment_type: AssignmentType,
    pub assignment_status: AssignmentStatus,
    pub fte: f64,
    pub effective_date: NaiveDate,
    pub acting_until: Option<NaiveDate>,
    pub auto_revert: bool,
    pub notes: Option<String>,
}

impl PositionAssignment {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        new: &NewPositionAssignment,
    ) -> Result<PositionAssignment> {
        let assignment = sqlx::query_as::<_, PositionAssignment>(
            r#"
            INSERT INTO position_assignments
                (tenant_id, position_code, position_record_id, employee_id,
                 employee_name, employee_number, assignment_type,
                 assignment_status, fte, effective_date, acting_until,
                 auto_revert, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(new.tenant_id)
        .bind(&new.position_code)
        .bind(new.position_record_id)
        .bind(new.employee_id)
        .bind(&new.employee_name)
        .bind(&new.employee_number)
        .bind(new.assignment_type.to_string())
        .bind(new.assignment_status.to_string())
        .bind(new.fte)
        .bind(new.effective_date)
        .bind(new.acting_until)
        .bind(new.auto_revert)
        .bind(&new.notes)
        .fetch_one(executor)
        .await?;

        Ok(assignment)
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        assignment_id: Uuid,
    ) -> Result<Option<PositionAssignment>> {
        let assignment = sqlx::query_as::<_, PositionAssignment>(
            r#"
            SELECT * FROM position_assignments
            WHERE tenant_id = $1 AND assignment_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(assignment_id)
        .fetch_optional(executor)
        .await?;

        Ok(assignment)
    }

    /// All assignments of one position, newest first.
    pub async fn list_for_position(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        position_code: &str,
    ) -> Result<Vec<PositionAssignment>> {
        let assignments = sqlx::query_as::<_, PositionAssignment>(
            r#"
            SELECT * FROM position_assignments
            WHERE tenant_id = $1 AND position_code = $2
            ORDER BY effective_date DESC, created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(position_code)
        .fetch_all(executor)
        .await?;

        Ok(assignments)
    }

    /// Sum of ACTIVE FTE against a position, excluding one assignment if an
    /// update is re-checking its own contribution.
    pub async fn active_fte_sum(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        position_code: &str,
        exclude: Option<Uuid>,
    ) -> Result<f64> {
        let sum: (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT SUM(fte) FROM position_assignments
            WHERE tenant_id = $1 AND position_code = $2
              AND assignment_status = 'ACTIVE'
              AND ($3::uuid IS NULL OR assignment_id <> $3)
            "#,
        )
        .bind(tenant_id)
        .bind(position_code)
        .bind(exclude)
        .fetch_one(executor)
        .await?;

        Ok(sum.0.unwrap_or(0.0))
    }

    /// Close an assignment. `end_date` lands on the row and the status goes
    /// to ENDED.
    pub async fn close(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        assignment_id: Uuid,
        end_date: NaiveDate,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE position_assignments
            SET assignment_status = 'ENDED', end_date = $3, is_current = false,
                updated_at = NOW()
            WHERE tenant_id = $1 AND assignment_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(assignment_id)
        .bind(end_date)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Apply mutable-field updates in place.
    pub async fn update_fields(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        assignment_id: Uuid,
        fte: f64,
        acting_until: Option<NaiveDate>,
        auto_revert: bool,
        notes: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE position_assignments
            SET fte = $3, acting_until = $4, auto_revert = $5, notes = $6,
                updated_at = NOW()
            WHERE tenant_id = $1 AND assignment_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(assignment_id)
        .bind(fte)
        .bind(acting_until)
        .bind(auto_revert)
        .bind(notes)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// PENDING assignments whose effective date has arrived.
    pub async fn due_pending(
        executor: impl PgExecutor<'_>,
        today: NaiveDate,
    ) -> Result<Vec<PositionAssignment>> {
        let due = sqlx::query_as::<_, PositionAssignment>(
            r#"
            SELECT * FROM position_assignments
            WHERE assignment_status = 'PENDING' AND effective_date <= $1
            ORDER BY tenant_id, position_code, effective_date
            "#,
        )
        .bind(today)
        .fetch_all(executor)
        .await?;

        Ok(due)
    }

    /// Flip one PENDING assignment to ACTIVE. Returns false when the row
    /// is no longer PENDING.
    pub async fn activate(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        assignment_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE position_assignments
            SET assignment_status = 'ACTIVE', updated_at = NOW()
            WHERE tenant_id = $1 AND assignment_id = $2
              AND assignment_status = 'PENDING'
            "#,
        )
        .bind(tenant_id)
        .bind(assignment_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Acting assignments due for auto-revert: ACTING, flagged, still ACTIVE,
    /// `acting_until` at or before `today`.
    pub async fn auto_revert_candidates(
        executor: impl PgExecutor<'_>,
        today: NaiveDate,
    ) -> Result<Vec<PositionAssignment>> {
        let candidates = sqlx::query_as::<_, PositionAssignment>(
            r#"
            SELECT * FROM position_assignments
            WHERE assignment_type = 'ACTING'
              AND auto_revert
              AND assignment_status = 'ACTIVE'
              AND acting_until IS NOT NULL
              AND acting_until <= $1
            ORDER BY tenant_id, position_code
            "#,
        )
        .bind(today)
        .fetch_all(executor)
        .await?;

        Ok(candidates)
    }

    pub fn status(&self) -> Result<AssignmentStatus> {
        self.assignment_status
            .parse()
            .map_err(crate::error::EngineError::InvalidRequest)
    }

    pub fn audit_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "assignment_id": self.assignment_id,
            "position_code": self.position_code,
            "employee_id": self.employee_id,
            "employee_name": self.employee_name,
            "assignment_type": self.assignment_type,
            "assignment_status": self.assignment_status,
            "fte": self.fte,
            "effective_date": self.effective_date,
            "end_date": self.end_date,
            "acting_until": self.acting_until,
            "auto_revert": self.auto_revert,
            "notes": self.notes,
        })
    }
}
