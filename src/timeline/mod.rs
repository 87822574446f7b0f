//! # Timeline Maintenance
//!
//! Derived timeline fields (`end_date`, `is_current`) are never trusted from
//! callers; they are recomputed from the set of non-deleted versions after
//! every mutation.

pub mod recalculator;

pub use recalculator::{plan_timeline, recalculate_in_tx, TimelineUpdate, VersionSlice};

/// Which versioned table a recalculation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKind {
    OrganizationUnit,
    Position,
}

impl TimelineKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::OrganizationUnit => "organization_units",
            Self::Position => "positions",
        }
    }

    /// Resource type recorded on audit entries for this kind.
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::OrganizationUnit => "organization_unit",
            Self::Position => "position",
        }
    }
}
