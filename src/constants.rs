//! Engine-wide constants.

/// Maximum number of levels in the organization hierarchy (root = 1).
pub const MAX_ORGANIZATION_DEPTH: i32 = 17;

/// Depth at which a validation warning is emitted (but the mutation allowed).
pub const DEPTH_WARNING_THRESHOLD: i32 = 15;

/// Separator used in denormalized code/name paths.
pub const PATH_SEPARATOR: &str = "/";

/// Tolerance for FTE arithmetic over DOUBLE PRECISION columns.
pub const FTE_EPSILON: f64 = 1e-9;

/// Actor recorded on audit entries written by scheduled jobs.
pub const SYSTEM_ACTOR: &str = "system";

/// Operation reason recorded when the auto-revert sweep closes an assignment.
pub const AUTO_REVERT_REASON: &str = "AUTO_REVERT_ACTING_ASSIGNMENT";
