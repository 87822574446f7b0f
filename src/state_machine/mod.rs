//! Status enums and the transition rules that govern them.

pub mod states;

pub use states::{AssignmentStatus, AssignmentType, OccupancyStatus, UnitStatus};
