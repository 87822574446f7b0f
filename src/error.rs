//! # Engine Error Taxonomy
//!
//! Typed errors for the temporal timeline engine. Every variant carries a
//! stable machine-readable code (`error_code`) plus the structured context a
//! transport layer needs to build a response: affected-child counts,
//! suggested dates, capacity numbers.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A non-deleted version already occupies the requested effective date.
    #[error("a version already exists at effective date {effective_date}")]
    TemporalPointConflict { effective_date: NaiveDate },

    /// The entity code already resolves to a non-deleted entity (creation only).
    #[error("code {code} is already in use")]
    DuplicateCode { code: String },

    /// The requested parent is the entity itself or one of its descendants.
    #[error("circular reference: {code} cannot be parented under {parent_code}")]
    CircularReference { code: String, parent_code: String },

    /// Deleting the last version of a unit that still has non-deleted children.
    #[error("organization {code} still has {child_count} non-deleted children")]
    OrganizationHasChildren { code: String, child_count: i64 },

    /// Filling or resizing an assignment would exceed position capacity.
    #[error(
        "headcount capacity exceeded for {position_code}: {current_usage} in use + {requested} requested > {capacity}"
    )]
    InvalidHeadcount {
        position_code: String,
        capacity: f64,
        current_usage: f64,
        requested: f64,
    },

    /// Mutation attempted against an ENDED (immutable) assignment.
    #[error("assignment {assignment_id} is {status} and cannot be modified")]
    InvalidAssignmentState { assignment_id: Uuid, status: String },

    /// Parent chain would exceed the maximum hierarchy depth.
    #[error("organization depth {attempted} exceeds the maximum of {max}")]
    DepthExceeded { attempted: i32, max: i32 },

    /// No ACTIVE version of the parent covers the requested effective date.
    /// `next_available` is the nearest future date at which it would.
    #[error("parent {parent_code} is not active at {effective_date}")]
    TemporalParentUnavailable {
        parent_code: String,
        effective_date: NaiveDate,
        next_available: Option<NaiveDate>,
    },

    /// Transition not permitted by the status transition table.
    #[error("cannot transition status from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Caller-supplied optimistic concurrency token no longer matches.
    #[error("stale revision: expected {expected}, got {supplied}")]
    PreconditionFailed { expected: Uuid, supplied: Uuid },

    /// Entity code or record id does not resolve to a non-deleted version.
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Stable machine-readable code for transport-layer error mapping.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TemporalPointConflict { .. } => "TEMPORAL_POINT_CONFLICT",
            Self::DuplicateCode { .. } => "DUPLICATE_CODE",
            Self::CircularReference { .. } => "CIRCULAR_REFERENCE",
            Self::OrganizationHasChildren { .. } => "ORGANIZATION_HAS_CHILDREN",
            Self::InvalidHeadcount { .. } => "INVALID_HEADCOUNT",
            Self::InvalidAssignmentState { .. } => "INVALID_ASSIGNMENT_STATE",
            Self::DepthExceeded { .. } => "DEPTH_EXCEEDED",
            Self::TemporalParentUnavailable { .. } => "TEMPORAL_PARENT_UNAVAILABLE",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// Conflicts are rejections of an otherwise well-formed request and are
    /// safe to surface verbatim to callers.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::TemporalPointConflict { .. }
                | Self::DuplicateCode { .. }
                | Self::CircularReference { .. }
                | Self::OrganizationHasChildren { .. }
                | Self::InvalidHeadcount { .. }
                | Self::InvalidAssignmentState { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
