#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Org Temporal Core
//!
//! Bitemporal timeline engine for multi-tenant organization structures:
//! versioned organization units and positions, a position assignment ledger,
//! and a full audit trail, all backed by PostgreSQL.
//!
//! ## Overview
//!
//! Every organization unit and position is stored as a series of
//! time-bounded versions. The non-deleted versions of one `(tenant, code)`
//! tile its timeline: sorted by effective date, each version's exclusive
//! `end_date` equals the next version's `effective_date`, the last version
//! is open-ended, and at most one version is current. The engine never
//! trusts those derived fields from callers; it recomputes them after every
//! mutation inside the mutation's own transaction.
//!
//! ## Key Features
//!
//! - **Timeline recalculation**: pure planning plus transactional apply
//! - **Versioned mutations**: create, insert version, move version, soft
//!   delete, status changes with idempotent merge semantics
//! - **Hierarchy consistency**: denormalized paths repaired by a BFS walker
//! - **Business rule validation**: depth bounds, circular references,
//!   temporal parent availability, status transition table
//! - **Assignment ledger**: FTE-checked fills, vacates, and acting
//!   auto-reverts
//! - **Audit trail**: before/after snapshots and field diffs written in the
//!   same transaction as the mutation
//!
//! ## Module Organization
//!
//! - [`models`] - Data layer: versioned rows and their query APIs
//! - [`timeline`] - Timeline planning and recalculation
//! - [`hierarchy`] - Ancestor/descendant queries and the consistency walker
//! - [`services`] - Transactional mutation operations
//! - [`validation`] - Business rule validators
//! - [`audit`] - Audit events, diffing, and persistence
//! - [`scheduler`] - Interval-driven sweeps
//! - [`state_machine`] - Status enums and transition rules
//! - [`config`] - Configuration management
//! - [`database`] - Connection pooling and migrations
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use org_temporal_core::audit::{Actor, OperationContext};
//! use org_temporal_core::services::{CreateOrganizationRequest, OrganizationService};
//! use org_temporal_core::state_machine::UnitStatus;
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let service = OrganizationService::new(pool);
//! let created = service
//!     .create_organization(
//!         Uuid::new_v4(),
//!         CreateOrganizationRequest {
//!             code: "HQ".into(),
//!             name: "Headquarters".into(),
//!             unit_type: "COMPANY".into(),
//!             parent_code: None,
//!             status: UnitStatus::Active,
//!             sort_order: 0,
//!             description: String::new(),
//!             effective_date: chrono::Utc::now().date_naive(),
//!             change_reason: None,
//!         },
//!         &Actor::user("admin", None),
//!         &OperationContext::default(),
//!     )
//!     .await?;
//! println!("created {}", created.entity.record_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Integration tests use SQLx native testing with automatic database
//! isolation:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests (requires DATABASE_URL)
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod hierarchy;
pub mod locking;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod state_machine;
pub mod timeline;
pub mod validation;

pub use audit::{Actor, AuditEvent, EventType, OperationContext};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use models::{AuditLog, OrganizationUnit, Position, PositionAssignment};
pub use services::{AssignmentService, Mutated, OrganizationService, PositionService};
pub use state_machine::{AssignmentStatus, AssignmentType, OccupancyStatus, UnitStatus};
pub use timeline::{plan_timeline, TimelineKind, TimelineUpdate};
