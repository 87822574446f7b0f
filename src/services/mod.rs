//! # Mutation Services
//!
//! Each operation here is one transaction: advisory lock, validation, SQL
//! mutation, timeline recalculation, hierarchy walk where parentage moved,
//! audit write, commit. Failure at any point rolls the whole thing back.

pub mod assignments;
pub mod organization;
pub mod position;

pub use assignments::{
    AssignmentService, FillPositionRequest, SweepOutcome, UpdateAssignmentRequest,
};
pub use organization::{
    CreateOrganizationRequest, InsertVersionRequest, OrganizationService,
    UpdateOrganizationRequest,
};
pub use position::{CreatePositionRequest, InsertPositionVersionRequest, PositionService};

/// A mutation result plus any advisory the validators raised (currently only
/// the approaching-depth-limit warning).
#[derive(Debug, Clone)]
pub struct Mutated<T> {
    pub entity: T,
    pub advisory: Option<String>,
}

impl<T> Mutated<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            advisory: None,
        }
    }

    pub fn with_advisory(entity: T, advisory: Option<String>) -> Self {
        Self { entity, advisory }
    }
}
