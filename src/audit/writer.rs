//! Audit persistence.
//!
//! `log_event_in_tx` runs inside the mutation transaction and propagates
//! failures, aborting the mutation. `log_failure` runs against the pool,
//! best-effort, and never blocks the primary operation.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use super::diff::{calculate_field_changes, modified_field_names};
use super::{Actor, AuditEvent, OperationContext};
use crate::error::{EngineError, Result};
use crate::models::AuditLog;

/// Persist a successful mutation's audit entry inside the transaction.
/// No-op updates are skipped and report `false`.
pub async fn log_event_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    event: &AuditEvent,
    actor: &Actor,
    context: &OperationContext,
) -> Result<bool> {
    if event.is_noop_update() {
        return Ok(false);
    }

    let entry = build_entry(tenant_id, event, actor, context, true, None);
    AuditLog::insert(&mut **tx, &entry).await?;
    Ok(true)
}

/// Record a rejected or failed operation. Write errors are logged and
/// swallowed so the caller's error, not the audit failure, reaches the
/// client.
pub async fn log_failure(
    pool: &PgPool,
    tenant_id: Uuid,
    event: &AuditEvent,
    actor: &Actor,
    context: &OperationContext,
    error: &EngineError,
) {
    let entry = build_entry(tenant_id, event, actor, context, false, Some(error));
    if let Err(write_err) = AuditLog::insert(pool, &entry).await {
        warn!(
            tenant_id = %tenant_id,
            resource_id = %event.resource_id,
            error = %write_err,
            "failed to record failure audit entry"
        );
    }
}

fn build_entry(
    tenant_id: Uuid,
    event: &AuditEvent,
    actor: &Actor,
    context: &OperationContext,
    success: bool,
    error: Option<&EngineError>,
) -> AuditLog {
    let changes = calculate_field_changes(&event.before_data, &event.after_data);
    let modified = modified_field_names(&changes);

    AuditLog {
        id: Uuid::new_v4(),
        tenant_id,
        event_type: event.event_type.as_str().to_string(),
        resource_type: event.resource_type.clone(),
        resource_id: event.resource_id.clone(),
        record_id: event.record_id,
        entity_code: event.entity_code.clone(),
        actor_id: actor.actor_id.clone(),
        actor_type: actor.actor_type.clone(),
        actor_name: actor.actor_name.clone(),
        action_name: event.action_name.clone(),
        request_id: context.request_id.clone(),
        correlation_id: context.correlation_id.clone(),
        operation_reason: context.operation_reason.clone(),
        occurred_at: event.occurred_at,
        success,
        error_code: error.map(|e| e.error_code().to_string()),
        error_message: error.map(|e| e.to_string()),
        before_data: event.before_data.clone(),
        after_data: event.after_data.clone(),
        modified_fields: serde_json::json!(modified),
        changes: serde_json::to_value(&changes).unwrap_or_else(|_| serde_json::json!([])),
        business_context: event.business_context.clone(),
    }
}
