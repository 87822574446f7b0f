//! Database models and their read/write query APIs.
//!
//! Each model owns the SQL that touches its table. Services compose these
//! queries inside transactions; every read here filters soft-deleted rows
//! explicitly.

pub mod audit_log;
pub mod organization_unit;
pub mod position;
pub mod position_assignment;

pub use audit_log::AuditLog;
pub use organization_unit::{NewOrganizationUnit, OrganizationUnit};
pub use position::{NewPosition, Position};
pub use position_assignment::{NewPositionAssignment, PositionAssignment};
