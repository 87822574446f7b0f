//! # Operational Scheduler
//!
//! Interval-driven background work: the acting auto-revert sweep and the
//! timeline consistency check. The driver runs on tokio intervals and shuts
//! down gracefully on a watch signal; both sweeps are also exposed as
//! one-shot entry points for external cron and for tests.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::models::{OrganizationUnit, Position};
use crate::services::{AssignmentService, OrganizationService, PositionService};

/// Outcome of one consistency check pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyOutcome {
    pub checked: usize,
    pub failed: usize,
}

pub struct Scheduler {
    pool: PgPool,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(pool: PgPool, config: SchedulerConfig) -> Self {
        Self {
            pool,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(pool: PgPool, config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            config,
            clock,
        }
    }

    /// Drive both sweeps on their configured intervals until `shutdown`
    /// flips to `true`. Sweep errors are logged; the driver keeps running.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("scheduler disabled by configuration");
            return;
        }

        let mut auto_revert_tick = interval(self.config.auto_revert_interval());
        let mut consistency_tick = interval(self.config.consistency_check_interval());
        // the first tick of a tokio interval fires immediately; skip it so
        // startup does not race an external cron run
        auto_revert_tick.tick().await;
        consistency_tick.tick().await;

        info!(
            auto_revert_interval_s = self.config.auto_revert_interval_seconds,
            consistency_interval_s = self.config.consistency_check_interval_seconds,
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = auto_revert_tick.tick() => {
                    if let Err(err) = self.run_auto_revert_sweep().await {
                        error!(error = %err, "auto-revert sweep failed");
                    }
                }
                _ = consistency_tick.tick() => {
                    if let Err(err) = self.run_consistency_check().await {
                        error!(error = %err, "consistency check failed");
                    }
                }
                changed = shutdown.changed() => {
                    // a dropped sender also means shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One-shot auto-revert pass: activate due PENDING assignments, then
    /// close expired acting assignments.
    pub async fn run_auto_revert_sweep(&self) -> Result<()> {
        let service = AssignmentService::with_clock(self.pool.clone(), self.clock.clone());

        let activated = service.activate_due_assignments().await?;
        if activated > 0 {
            info!(activated, "pending assignments activated");
        }

        let outcome = service.process_auto_reverts().await?;
        info!(
            processed = outcome.processed,
            failed = outcome.failed,
            "auto-revert sweep complete"
        );
        Ok(())
    }

    /// One-shot consistency pass: recompute every entity's timeline.
    /// Per-entity failures are logged and counted, never fatal.
    pub async fn run_consistency_check(&self) -> Result<ConsistencyOutcome> {
        let mut outcome = ConsistencyOutcome::default();

        let org_service =
            OrganizationService::with_clock(self.pool.clone(), self.clock.clone());
        for (tenant_id, code) in OrganizationUnit::list_all_entities(&self.pool).await? {
            outcome.checked += 1;
            if let Err(err) = org_service.recalculate_timeline(tenant_id, &code).await {
                outcome.failed += 1;
                error!(
                    tenant_id = %tenant_id,
                    code = %code,
                    error = %err,
                    "organization timeline consistency check failed"
                );
            }
        }

        let position_service =
            PositionService::with_clock(self.pool.clone(), self.clock.clone());
        for (tenant_id, code) in Position::list_all_entities(&self.pool).await? {
            outcome.checked += 1;
            if let Err(err) = position_service.recalculate_timeline(tenant_id, &code).await {
                outcome.failed += 1;
                error!(
                    tenant_id = %tenant_id,
                    code = %code,
                    error = %err,
                    "position timeline consistency check failed"
                );
            }
        }

        crate::logging::log_sweep_operation(
            "timeline_consistency",
            outcome.checked,
            outcome.failed,
            None,
        );

        Ok(outcome)
    }
}
