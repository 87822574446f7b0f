//! # AuditLog Model
//!
//! Append-only rows, one per mutation, written in the same transaction as
//! the mutation they record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub event_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub record_id: Option<Uuid>,
    pub entity_code: Option<String>,
    pub actor_id: String,
    pub actor_type: String,
    pub actor_name: Option<String>,
    pub action_name: String,
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
    pub operation_reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub before_data: serde_json::Value,
    pub after_data: serde_json::Value,
    pub modified_fields: serde_json::Value,
    pub changes: serde_json::Value,
    pub business_context: serde_json::Value,
}

impl AuditLog {
    pub async fn insert(executor: impl PgExecutor<'_>, entry: &AuditLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, tenant_id, event_type, resource_type, resource_id,
                 record_id, entity_code, actor_id, actor_type, actor_name,
                 action_name, request_id, correlation_id, operation_reason,
                 occurred_at, success, error_code, error_message, before_data,
                 after_data, modified_fields, changes, business_context)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id)
        .bind(&entry.event_type)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(entry.record_id)
        .bind(&entry.entity_code)
        .bind(&entry.actor_id)
        .bind(&entry.actor_type)
        .bind(&entry.actor_name)
        .bind(&entry.action_name)
        .bind(&entry.request_id)
        .bind(&entry.correlation_id)
        .bind(&entry.operation_reason)
        .bind(entry.occurred_at)
        .bind(entry.success)
        .bind(&entry.error_code)
        .bind(&entry.error_message)
        .bind(&entry.before_data)
        .bind(&entry.after_data)
        .bind(&entry.modified_fields)
        .bind(&entry.changes)
        .bind(&entry.business_context)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Audit history for one resource, newest first.
    pub async fn history_for_resource(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        resource_type: &str,
        resource_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditLog>> {
        let entries = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT * FROM audit_logs
            WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3
            ORDER BY occurred_at DESC
            LIMIT $4
            "#,
        )
        .bind(tenant_id)
        .bind(resource_type)
        .bind(resource_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }

    /// Audit history for one entity code across resource types, newest first.
    pub async fn history_for_entity(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        entity_code: &str,
        limit: i64,
    ) -> Result<Vec<AuditLog>> {
        let entries = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT * FROM audit_logs
            WHERE tenant_id = $1 AND entity_code = $2
            ORDER BY occurred_at DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(entity_code)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }
}
