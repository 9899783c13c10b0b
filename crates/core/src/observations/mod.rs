//! Observation records: the external payload shape, the validated domain
//! type, and the contracts for the source and the store.

mod observations_model;
mod observations_traits;

pub use observations_model::*;
pub use observations_traits::*;
