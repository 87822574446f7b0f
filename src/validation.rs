//! # Business Rule Validation
//!
//! Structural rules checked before any timeline mutation: depth bounds,
//! circular references, temporal parent availability, status transitions,
//! and code uniqueness. Validators run inside the mutation transaction so
//! they see rows already written by the current operation.

use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::warn;
use uuid::Uuid;

use crate::constants::{DEPTH_WARNING_THRESHOLD, MAX_ORGANIZATION_DEPTH};
use crate::error::{EngineError, Result};
use crate::hierarchy;
use crate::models::{OrganizationUnit, Position};
use crate::state_machine::UnitStatus;

/// Reject a new code that is already in use by a non-deleted organization.
pub async fn validate_new_organization_code(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
) -> Result<()> {
    if OrganizationUnit::code_exists(&mut *conn, tenant_id, code).await? {
        return Err(EngineError::DuplicateCode {
            code: code.to_string(),
        });
    }
    Ok(())
}

/// Reject a new code that is already in use by a non-deleted position.
pub async fn validate_new_position_code(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
) -> Result<()> {
    if Position::code_exists(&mut *conn, tenant_id, code).await? {
        return Err(EngineError::DuplicateCode {
            code: code.to_string(),
        });
    }
    Ok(())
}

/// Check that attaching a child under `parent_code` stays within the depth
/// bound. Returns an advisory string when the tree is approaching the limit.
pub async fn validate_depth(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    parent_code: &str,
) -> Result<Option<String>> {
    let parent_depth = hierarchy::organization_depth(conn, tenant_id, parent_code).await?;
    let attempted = parent_depth + 1;

    if attempted > MAX_ORGANIZATION_DEPTH {
        return Err(EngineError::DepthExceeded {
            attempted,
            max: MAX_ORGANIZATION_DEPTH,
        });
    }

    if attempted >= DEPTH_WARNING_THRESHOLD {
        let advisory = format!(
            "organization depth {attempted} is approaching the maximum of {MAX_ORGANIZATION_DEPTH}"
        );
        warn!(
            tenant_id = %tenant_id,
            parent_code = %parent_code,
            depth = attempted,
            "organization hierarchy approaching depth limit"
        );
        return Ok(Some(advisory));
    }

    Ok(None)
}

/// Reject self-parenting and any parent that already sits below `code`.
pub async fn validate_no_circular_reference(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
    parent_code: &str,
) -> Result<()> {
    if code == parent_code {
        return Err(EngineError::CircularReference {
            code: code.to_string(),
            parent_code: parent_code.to_string(),
        });
    }

    let ancestors = hierarchy::ancestor_chain(conn, tenant_id, parent_code).await?;
    if ancestors.iter().any(|ancestor| ancestor == code) {
        return Err(EngineError::CircularReference {
            code: code.to_string(),
            parent_code: parent_code.to_string(),
        });
    }

    Ok(())
}

/// Require an ACTIVE version of the parent covering `effective_date`. On
/// failure the error carries the nearest future date that would work.
pub async fn validate_parent_available_at(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    parent_code: &str,
    effective_date: NaiveDate,
) -> Result<()> {
    if hierarchy::is_active_at(conn, tenant_id, parent_code, effective_date).await? {
        return Ok(());
    }

    let next_available =
        hierarchy::next_active_date(conn, tenant_id, parent_code, effective_date).await?;

    Err(EngineError::TemporalParentUnavailable {
        parent_code: parent_code.to_string(),
        effective_date,
        next_available,
    })
}

/// Enforce the status transition table. Identical statuses pass.
pub fn validate_status_transition(from: UnitStatus, to: UnitStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(EngineError::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Run the full parent rule set for a mutation that sets `parent_code`.
/// Returns any depth advisory for the caller to surface.
pub async fn validate_parent_rules(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
    parent_code: &str,
    effective_date: NaiveDate,
) -> Result<Option<String>> {
    validate_no_circular_reference(conn, tenant_id, code, parent_code).await?;
    validate_parent_available_at(conn, tenant_id, parent_code, effective_date).await?;
    validate_depth(conn, tenant_id, parent_code).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_enforced() {
        assert!(validate_status_transition(UnitStatus::Active, UnitStatus::Inactive).is_ok());
        assert!(validate_status_transition(UnitStatus::Planned, UnitStatus::Active).is_ok());
        assert!(validate_status_transition(UnitStatus::Active, UnitStatus::Active).is_ok());

        let err =
            validate_status_transition(UnitStatus::Deleted, UnitStatus::Active).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");

        let err =
            validate_status_transition(UnitStatus::Planned, UnitStatus::Inactive).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
    }
}
