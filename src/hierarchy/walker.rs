//! # Hierarchy Consistency Walker
//!
//! After a parentage or rename change, the denormalized `code_path`,
//! `name_path`, and `level` of the mutated unit and every descendant must be
//! recomputed. The walker does a breadth-first traversal from the mutated
//! code, querying children live at each node; a visited set guarantees
//! termination even if a cycle slipped into the data.

use std::collections::{HashSet, VecDeque};

use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::PATH_SEPARATOR;
use crate::error::Result;
use crate::models::OrganizationUnit;

/// Recompute denormalized hierarchy fields for `code` and all descendants,
/// over current versions. Returns the number of rows updated.
pub async fn update_hierarchy_paths(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    code: &str,
) -> Result<u64> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut touched = 0u64;

    queue.push_back(code.to_string());

    while let Some(current_code) = queue.pop_front() {
        if !visited.insert(current_code.clone()) {
            warn!(
                tenant_id = %tenant_id,
                code = %current_code,
                "cycle detected during hierarchy walk, skipping revisit"
            );
            continue;
        }

        let Some(unit) =
            OrganizationUnit::find_current(&mut *conn, tenant_id, &current_code).await?
        else {
            continue;
        };

        let (code_path, name_path, level) = match &unit.parent_code {
            Some(parent_code) => {
                match OrganizationUnit::find_current(&mut *conn, tenant_id, parent_code).await? {
                    Some(parent) => (
                        join_path(&parent.code_path, &unit.code),
                        join_path(&parent.name_path, &unit.name),
                        parent.level + 1,
                    ),
                    // parent has no current version; treat this node as a root
                    None => (unit.code.clone(), unit.name.clone(), 1),
                }
            }
            None => (unit.code.clone(), unit.name.clone(), 1),
        };

        if code_path != unit.code_path || name_path != unit.name_path || level != unit.level {
            sqlx::query(
                r#"
                UPDATE organization_units
                SET code_path = $3, name_path = $4, level = $5, updated_at = NOW()
                WHERE tenant_id = $1 AND record_id = $2
                "#,
            )
            .bind(tenant_id)
            .bind(unit.record_id)
            .bind(&code_path)
            .bind(&name_path)
            .bind(level)
            .execute(&mut *conn)
            .await?;
            touched += 1;
        }

        let children =
            OrganizationUnit::current_children(&mut *conn, tenant_id, &current_code).await?;
        for child in children {
            queue.push_back(child.code);
        }
    }

    if touched > 0 {
        info!(
            tenant_id = %tenant_id,
            code = %code,
            rows = touched,
            "hierarchy paths updated"
        );
    }

    Ok(touched)
}

/// Compute the denormalized paths and level a new child of `parent` gets.
/// `parent = None` makes a root at level 1.
pub fn child_paths(
    parent: Option<&OrganizationUnit>,
    code: &str,
    name: &str,
) -> (String, String, i32) {
    match parent {
        Some(parent) => (
            join_path(&parent.code_path, code),
            join_path(&parent.name_path, name),
            parent.level + 1,
        ),
        None => (code.to_string(), name.to_string(), 1),
    }
}

fn join_path(parent_path: &str, segment: &str) -> String {
    if parent_path.is_empty() {
        segment.to_string()
    } else {
        format!("{parent_path}{PATH_SEPARATOR}{segment}")
    }
}
