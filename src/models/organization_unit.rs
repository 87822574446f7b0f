//! # OrganizationUnit Model
//!
//! One row per time slice of an organization unit. The non-deleted versions
//! of a `(tenant_id, code)` tile its timeline; `end_date` is exclusive and
//! equals the next version's `effective_date`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::state_machine::UnitStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationUnit {
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub parent_code: Option<String>,
    pub name: String,
    pub unit_type: String,
    pub status: String,
    pub level: i32,
    pub code_path: String,
    pub name_path: String,
    pub sort_order: i32,
    pub description: String,
    pub effective_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub change_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Payload for inserting a new version row.
#[derive(Debug, Clone)]
pub struct NewOrganizationUnit {
    pub tenant_id: Uuid,
    pub code: String,
    pub parent_code: Option<String>,
    pub name: String,
    pub unit_type: String,
    pub status: UnitStatus,
    pub level: i32,
    pub code_path: String,
    pub name_path: String,
    pub sort_order: i32,
    pub description: String,
    pub effective_date: NaiveDate,
    pub change_reason: Option<String>,
}

impl OrganizationUnit {
    /// Insert a new version row. Timeline fields (`end_date`, `is_current`)
    /// start unset; recalculation assigns them.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        new: &NewOrganizationUnit,
    ) -> Result<OrganizationUnit> {
        let unit = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            INSERT INTO organization_units
                (tenant_id, code, parent_code, name, unit_type, status, level,
                 code_path, name_path, sort_order, description, effective_date,
                 change_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(new.tenant_id)
        .bind(&new.code)
        .bind(&new.parent_code)
        .bind(&new.name)
        .bind(&new.unit_type)
        .bind(new.status.to_string())
        .bind(new.level)
        .bind(&new.code_path)
        .bind(&new.name_path)
        .bind(new.sort_order)
        .bind(&new.description)
        .bind(new.effective_date)
        .bind(&new.change_reason)
        .fetch_one(executor)
        .await?;

        Ok(unit)
    }

    pub async fn find_by_record_id(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<OrganizationUnit>> {
        let unit = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
            WHERE tenant_id = $1 AND record_id = $2
              AND status <> 'DELETED' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(record_id)
        .fetch_optional(executor)
        .await?;

        Ok(unit)
    }

    /// The single current version, if the timeline has one. All-future
    /// timelines legitimately return `None`.
    pub async fn find_current(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<OrganizationUnit>> {
        let unit = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
            WHERE tenant_id = $1 AND code = $2 AND is_current
              AND status <> 'DELETED' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(executor)
        .await?;

        Ok(unit)
    }

    /// Version in effect on `as_of`: `effective_date <= as_of < end_date`.
    pub async fn find_at_date(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
        as_of: NaiveDate,
    ) -> Result<Option<OrganizationUnit>> {
        let unit = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
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

        Ok(unit)
    }

    /// All non-deleted versions, effective date ascending.
    pub async fn timeline(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Vec<OrganizationUnit>> {
        let versions = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
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

    /// Latest non-deleted version by effective date, current or not. Used as
    /// the inheritance source when inserting sparse new versions.
    pub async fn latest_version(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<Option<OrganizationUnit>> {
        let unit = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
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

        Ok(unit)
    }

    /// Non-deleted version sitting exactly at `effective_date`, for
    /// temporal-point conflict checks.
    pub async fn version_at_point(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
        effective_date: NaiveDate,
    ) -> Result<Option<OrganizationUnit>> {
        let unit = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
            WHERE tenant_id = $1 AND code = $2 AND effective_date = $3
              AND status <> 'DELETED' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .bind(effective_date)
        .fetch_optional(executor)
        .await?;

        Ok(unit)
    }

    /// Whether any non-deleted version exists for this code.
    pub async fn code_exists(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM organization_units
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

    /// Current versions of the direct children of `parent_code`, ordered for
    /// display.
    pub async fn current_children(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        parent_code: &str,
    ) -> Result<Vec<OrganizationUnit>> {
        let children = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
            WHERE tenant_id = $1 AND parent_code = $2 AND is_current
              AND status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY sort_order ASC, code ASC
            "#,
        )
        .bind(tenant_id)
        .bind(parent_code)
        .fetch_all(executor)
        .await?;

        Ok(children)
    }

    /// Current versions of every descendant of `code`, matched on the
    /// denormalized code path, ordered by depth.
    pub async fn current_descendants(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code_path: &str,
    ) -> Result<Vec<OrganizationUnit>> {
        let descendants = sqlx::query_as::<_, OrganizationUnit>(
            r#"
            SELECT * FROM organization_units
            WHERE tenant_id = $1 AND code_path LIKE $2 AND is_current
              AND status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY level ASC, sort_order ASC, code ASC
            "#,
        )
        .bind(tenant_id)
        .bind(format!("{code_path}/%"))
        .fetch_all(executor)
        .await?;

        Ok(descendants)
    }

    /// Count of distinct non-deleted child codes, current version or not.
    /// Guards deletion of the last version of a parent.
    pub async fn non_deleted_child_count(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        code: &str,
    ) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT code) FROM organization_units
            WHERE tenant_id = $1 AND parent_code = $2
              AND status <> 'DELETED' AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_one(executor)
        .await?;

        Ok(count.0)
    }

    /// Distinct non-deleted codes for a tenant, for the consistency sweep.
    pub async fn list_codes(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT code FROM organization_units
            WHERE tenant_id = $1
              AND status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY code
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(|(code,)| code).collect())
    }

    /// All distinct `(tenant_id, code)` pairs with non-deleted versions.
    pub async fn list_all_entities(
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<(Uuid, String)>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT tenant_id, code FROM organization_units
            WHERE status <> 'DELETED' AND deleted_at IS NULL
            ORDER BY tenant_id, code
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Soft-delete one version row.
    pub async fn soft_delete(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE organization_units
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

    /// Parsed lifecycle status. Rows always hold a known value; an unknown
    /// one indicates out-of-band writes.
    pub fn unit_status(&self) -> Result<UnitStatus> {
        self.status.parse().map_err(crate::error::EngineError::InvalidRequest)
    }

    /// JSON snapshot for audit before/after payloads.
    pub fn audit_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "record_id": self.record_id,
            "code": self.code,
            "parent_code": self.parent_code,
            "name": self.name,
            "unit_type": self.unit_type,
            "status": self.status,
            "level": self.level,
            "code_path": self.code_path,
            "name_path": self.name_path,
            "sort_order": self.sort_order,
            "description": self.description,
            "effective_date": self.effective_date,
            "end_date": self.end_date,
            "is_current": self.is_current,
        })
    }
}
