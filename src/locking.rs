//! Per-entity advisory locking.
//!
//! Every mutation of a `(tenant_id, code)` timeline serializes on a
//! transaction-scoped Postgres advisory lock, so concurrent writers to the
//! same entity queue rather than interleave. The lock is released
//! automatically on commit or rollback.

use sqlx::{Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Acquire the advisory lock for one entity inside the current transaction.
/// Blocks until the lock is granted.
pub async fn acquire_entity_lock(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    code: &str,
) -> Result<()> {
    let key = lock_key(tenant_id, code);
    debug!(lock_key = %key, "acquiring entity advisory lock");

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(&key)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn lock_key(tenant_id: Uuid, code: &str) -> String {
    format!("{tenant_id}:{code}")
}
