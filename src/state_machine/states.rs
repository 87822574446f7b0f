use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an organization unit or position version.
///
/// Stored as UPPERCASE strings in the database. `Deleted` is terminal; it is
/// only ever reached through soft delete and deleted rows are invisible to
/// every read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// Version is live and participates in hierarchy validation
    Active,
    /// Version is suspended but retained on the timeline
    Inactive,
    /// Version exists only in the future
    Planned,
    /// Soft-deleted, terminal
    Deleted,
}

impl UnitStatus {
    /// Check whether the status transition table permits moving to `target`.
    /// Identical statuses are always allowed so repeated requests stay
    /// idempotent.
    pub fn can_transition_to(&self, target: UnitStatus) -> bool {
        if *self == target {
            return true;
        }
        match self {
            Self::Active => matches!(target, Self::Inactive | Self::Deleted),
            Self::Inactive => matches!(target, Self::Active | Self::Deleted),
            Self::Planned => matches!(target, Self::Active | Self::Deleted),
            Self::Deleted => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Planned => write!(f, "PLANNED"),
            Self::Deleted => write!(f, "DELETED"),
        }
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "PLANNED" => Ok(Self::Planned),
            "DELETED" => Ok(Self::Deleted),
            _ => Err(format!("Invalid unit status: {s}")),
        }
    }
}

impl Default for UnitStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Status of a position assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    /// Effective date is in the future
    Pending,
    /// Currently occupying capacity
    Active,
    /// Closed, immutable
    Ended,
}

impl AssignmentStatus {
    /// ENDED assignments never change again.
    pub fn is_mutable(&self) -> bool {
        !matches!(self, Self::Ended)
    }

    /// Whether the assignment's FTE counts against position capacity.
    pub fn consumes_capacity(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Ended => write!(f, "ENDED"),
        }
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            "ENDED" => Ok(Self::Ended),
            _ => Err(format!("Invalid assignment status: {s}")),
        }
    }
}

/// How an employee holds a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    Primary,
    Secondary,
    /// Temporary coverage, optionally auto-reverted at `acting_until`
    Acting,
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "PRIMARY"),
            Self::Secondary => write!(f, "SECONDARY"),
            Self::Acting => write!(f, "ACTING"),
        }
    }
}

impl std::str::FromStr for AssignmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRIMARY" => Ok(Self::Primary),
            "SECONDARY" => Ok(Self::Secondary),
            "ACTING" => Ok(Self::Acting),
            _ => Err(format!("Invalid assignment type: {s}")),
        }
    }
}

impl Default for AssignmentType {
    fn default() -> Self {
        Self::Primary
    }
}

/// Derived occupancy of a position, recomputed whenever the FTE ledger moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupancyStatus {
    Vacant,
    PartiallyFilled,
    Filled,
}

impl OccupancyStatus {
    /// Classify `in_use` FTE against `capacity` with an epsilon tolerance.
    pub fn from_usage(in_use: f64, capacity: f64) -> Self {
        use crate::constants::FTE_EPSILON;
        if in_use <= FTE_EPSILON {
            Self::Vacant
        } else if in_use + FTE_EPSILON >= capacity {
            Self::Filled
        } else {
            Self::PartiallyFilled
        }
    }
}

impl fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vacant => write!(f, "VACANT"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
        }
    }
}

impl std::str::FromStr for OccupancyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VACANT" => Ok(Self::Vacant),
            "PARTIALLY_FILLED" => Ok(Self::PartiallyFilled),
            "FILLED" => Ok(Self::Filled),
            _ => Err(format!("Invalid occupancy status: {s}")),
        }
    }
}
