//! # Hierarchy Queries and Consistency
//!
//! Parent/child structure is denormalized onto each version row as
//! `code_path`, `name_path`, and `level`. Queries here read the structure;
//! the walker repairs the denormalized fields after a parentage change.
//!
//! Functions take a `PgConnection` so they run equally against a pool
//! connection or inside a caller's transaction.

pub mod walker;

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

pub use walker::update_hierarchy_paths;

use crate::constants::MAX_ORGANIZATION_DEPTH;
use crate::error::Result;
use crate::models::OrganizationUnit;

/// Codes of the ancestors of `code`, nearest parent first, walked over
/// current versions. The walk stops if it ever revisits a code or exceeds
/// the depth bound, so a corrupted cycle cannot hang it.
pub async fn ancestor_chain(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
) -> Result<Vec<String>> {
    let mut chain = Vec::new();
    let mut cursor = code.to_string();

    for _ in 0..MAX_ORGANIZATION_DEPTH {
        let Some(unit) = OrganizationUnit::find_current(&mut *conn, tenant_id, &cursor).await?
        else {
            break;
        };
        let Some(parent_code) = unit.parent_code else {
            break;
        };
        if chain.contains(&parent_code) || parent_code == code {
            chain.push(parent_code);
            break;
        }
        chain.push(parent_code.clone());
        cursor = parent_code;
    }

    Ok(chain)
}

/// Depth of `code` in the hierarchy: the current version's level, or the
/// ancestor-chain length plus one when the level field cannot be trusted.
pub async fn organization_depth(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
) -> Result<i32> {
    match OrganizationUnit::find_current(&mut *conn, tenant_id, code).await? {
        Some(unit) if unit.level >= 1 => Ok(unit.level),
        _ => {
            let chain = ancestor_chain(conn, tenant_id, code).await?;
            Ok(chain.len() as i32 + 1)
        }
    }
}

/// The nearest future date on which `code` has an ACTIVE version, if any.
/// Used as the hint when a parent is unavailable at a requested date.
pub async fn next_active_date(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
    after: NaiveDate,
) -> Result<Option<NaiveDate>> {
    let row: (Option<NaiveDate>,) = sqlx::query_as(
        r#"
        SELECT MIN(effective_date) FROM organization_units
        WHERE tenant_id = $1 AND code = $2
          AND status = 'ACTIVE'
          AND effective_date > $3
          AND deleted_at IS NULL
        "#,
    )
    .bind(tenant_id)
    .bind(code)
    .bind(after)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.0)
}

/// Whether an ACTIVE version of `code` covers `as_of`.
pub async fn is_active_at(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
    as_of: NaiveDate,
) -> Result<bool> {
    let version = OrganizationUnit::find_at_date(&mut *conn, tenant_id, code, as_of).await?;
    Ok(matches!(version, Some(v) if v.status == "ACTIVE"))
}
