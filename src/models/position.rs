//! # Position Model
//!
//! Versioned positions share the temporal shape of organization units and
//! additionally carry the headcount ledger (`headcount_capacity`,
//! `headcount_in_use`, `occupancy_status`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::state_machine::{OccupancyStatus, UnitStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub organization_code: String,
    pub title: String,
    pub status: String,
    pub occupancy_status: String,
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
    pub headcount_in_use: f64,
    pub description: String,
    pub effective_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub change_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Payload for inserting a new position version row.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub tenant_id: Uuid,
    pub code: String,
    pub organization_code: String,
    pub title: String,
    pub status: UnitStatus,
    pub occupancy_status: OccupancyStatus,
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
    pub headcount_in_use: f64,
    pub description: String,
    pub effective_date: NaiveDate,
    pub change_reason: Option<String>,
}

impl Position {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        new: &NewPosition,
    ) -> Result<Position> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            INSERT INTO positions
                (tenant_id, code, organization_code, title, status,
                 occupancy_status, job_family_group_code,
                 job_family_group_record_id, job_family_code,
                 job_family_record_id, job_role_code, job_role_record_id,
                 job_level_code, job_level_record_id, employment_type,
                 headcount_capacity, headcount_in_use, description,
                 effective_date, change_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(new.tenant_id)
        .bind(&new.code)
        .bind(&new.organization_code)
        .bind(&new.title)
        .bind(new.status.to_string())
        .bind(new.occupancy_status.to_string())
        .bind(&new.job_family_group_code)
        .bind(new.job_family_group_record_id)
        .bind(&new.job_family_code)
        .bind(new.job_family_record_id)
        .bind(&new.job_role_code)
        .bind(new.job_role_record_id)
        .bind(&new.job_level_code)
        .bind(new.job_level_record_id)
        .bind(&new.employment_type)
        .bind(new.headcount_capacity)
        .bind(new.headcount_in_use)
        .bind(&new.description)
        .bind(new.effective_date)
        .bind(&new.change_reason)
        .fetch_one(executor)
        .await?;

        Ok(position)
    }

    pub async fn find_by_record_id(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            SELECT * FROM positions
            WHERE tenant_id = $1 AND record_id = $2
              AND status <> 'DELETED' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(record_id)
        .fetch_optional(executor)
        .await?;

        Ok(position)
    }

    pub async fn find_current(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            SELECT * FROM positions
            WHERE tenant_id = $1 AND code = $2 AND is_current
              AND status <> 'DELETED' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(executor)
        .await?;

        Ok(position)
    }

    /// Version in effect on `as_of`: `effective_date <= as_of < end_date`.
    pub async fn find_at_date(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
        as_of: NaiveDate,
    ) -> Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            SELECT * FROM positions
            WHERE tenant_id = $1 AND code = $2
              AND effective_date <= $3
              AND (end_date IS NULL OR end_date > $3)
              AND status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY effective_date DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .bind(as_of)
        .fetch_optional(executor)
        .await?;

        Ok(position)
    }

    pub async fn timeline(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Vec<Position>> {
        let versions = sqlx::query_as::<_, Position>(
            r#"
            SELECT * FROM positions
            WHERE tenant_id = $1 AND code = $2
              AND status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY effective_date ASC
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_all(executor)
        .await?;

        Ok(versions)
    }

    pub async fn latest_version(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            SELECT * FROM positions
            WHERE tenant_id = $1 AND code = $2
              AND status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY effective_date DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(executor)
        .await?;

        Ok(position)
    }

    pub async fn version_at_point(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
        effective_date: NaiveDate,
    ) -> Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            SELECT * FROM positions
            WHERE tenant_id = $1 AND code = $2 AND effective_date = $3
              AND status <> 'DELETED' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .bind(effective_date)
        .fetch_optional(executor)
        .await?;

        Ok(position)
    }

    pub async fn code_exists(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM positions
                WHERE tenant_id = $1 AND code = $2
                  AND status <> 'DELETED' AND deleted_at IS NULL
            )
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_one(executor)
        .await?;

        Ok(exists.0)
    }

    /// Current positions attached to one organization unit.
    pub async fn list_for_organization(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        organization_code: &str,
    ) -> Result<Vec<Position>> {
        let positions = sqlx::query_as::<_, Position>(
            r#"
            SELECT * FROM positions
            WHERE tenant_id = $1 AND organization_code = $2 AND is_current
              AND status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY code ASC
            "#,
        )
        .bind(tenant_id)
        .bind(organization_code)
        .fetch_all(executor)
        .await?;

        Ok(positions)
    }

    pub async fn list_all_entities(
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<(Uuid, String)>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT tenant_id, code FROM positions
            WHERE status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY tenant_id, code
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn soft_delete(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE positions
            SET status = 'DELETED', deleted_at = NOW(), is_current = false,
                updated_at = NOW()
            WHERE tenant_id = $1 AND record_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(record_id)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Persist the recomputed ledger onto the current version row.
    pub async fn update_occupancy(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        record_id: Uuid,
        in_use: f64,
        occupancy: OccupancyStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE positions
            SET headcount_in_use = $3, occupancy_status = $4, updated_at = NOW()
            WHERE tenant_id = $1 AND record_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(record_id)
        .bind(in_use)
        .bind(occupancy.to_string())
        .execute(executor)
        .await?;

        Ok(())
    }

    pub fn unit_status(&self) -> Result<UnitStatus> {
        self.status.parse().map_err(crate::error::EngineError::InvalidRequest)
    }

    pub fn audit_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "record_id": self.record_id,
            "code": self.code,
            "organization_code": self.organization_code,
            "title": self.title,
            "status": self.status,
            "occupancy_status": self.occupancy_status,
            "employment_type": self.employment_type,
            "headcount_capacity": self.headcount_capacity,
            "headcount_in_use": self.headcount_in_use,
            "description": self.description,
            "effective_date": self.effective_date,
            "end_date": self.end_date,
            "is_current": self.is_current,
        })
    }
}
