//! # Timeline Recalculator
//!
//! The single writer of `end_date` and `is_current`. Planning is pure and
//! unit-testable; `recalculate_in_tx` applies a plan inside the caller's
//! transaction with the version rows locked.
//!
//! The rules:
//! - versions sort by effective date ascending
//! - each version's `end_date` is the next version's `effective_date`
//!   (exclusive upper bound); the last version is open-ended
//! - current is the latest version with `effective_date <= today`; a
//!   timeline that lives entirely in the future has no current version

use chrono::NaiveDate;
use sqlx::{FromRow, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::TimelineKind;
use crate::error::Result;

/// The slice of a version row the planner needs.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct VersionSlice {
    pub record_id: Uuid,
    pub effective_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
}

/// One row's recomputed timeline fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineUpdate {
    pub record_id: Uuid,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
}

/// Compute the target timeline state for a set of versions. The input need
/// not be sorted. Duplicate effective dates violate the temporal-point
/// constraint upstream and are not handled here.
pub fn plan_timeline(versions: &[VersionSlice], today: NaiveDate) -> Vec<TimelineUpdate> {
    let mut ordered: Vec<&VersionSlice> = versions.iter().collect();
    ordered.sort_by_key(|v| v.effective_date);

    let current_idx = ordered
        .iter()
        .rposition(|v| v.effective_date <= today);

    ordered
        .iter()
        .enumerate()
        .map(|(i, version)| TimelineUpdate {
            record_id: version.record_id,
            end_date: ordered.get(i + 1).map(|next| next.effective_date),
            is_current: Some(i) == current_idx,
        })
        .collect()
}

/// Recalculate one entity's timeline inside a transaction.
///
/// Loads the non-deleted versions `FOR UPDATE`, clears `is_current` across
/// the whole `(tenant, code)` group first (deleted rows included, so the
/// partial unique index never sees two current rows mid-update), then writes
/// the planned state. Returns the refreshed plan in effective-date order.
pub async fn recalculate_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    kind: TimelineKind,
    tenant_id: Uuid,
    code: &str,
    today: NaiveDate,
) -> Result<Vec<TimelineUpdate>> {
    let table = kind.table();

    let versions = sqlx::query_as::<_, VersionSlice>(&format!(
        r#"
        SELECT record_id, effective_date, end_date, is_current
        FROM {table}
        WHERE tenant_id = $1 AND code = $2
          AND status <> 'DELETED' AND deleted_at IS NULL
        ORDER BY effective_date ASC
        FOR UPDATE
        "#
    ))
    .bind(tenant_id)
    .bind(code)
    .fetch_all(&mut **tx)
    .await?;

    sqlx::query(&format!(
        "UPDATE {table} SET is_current = false, updated_at = NOW()
         WHERE tenant_id = $1 AND code = $2 AND is_current"
    ))
    .bind(tenant_id)
    .bind(code)
    .execute(&mut **tx)
    .await?;

    let plan = plan_timeline(&versions, today);

    for update in &plan {
        sqlx::query(&format!(
            "UPDATE {table}
             SET end_date = $3, is_current = $4, updated_at = NOW()
             WHERE tenant_id = $1 AND record_id = $2"
        ))
        .bind(tenant_id)
        .bind(update.record_id)
        .bind(update.end_date)
        .bind(update.is_current)
        .execute(&mut **tx)
        .await?;
    }

    debug!(
        tenant_id = %tenant_id,
        code = %code,
        table = table,
        versions = plan.len(),
        "timeline recalculated"
    );

    Ok(plan)
}
