//! Domain core for the BioQuest observation pipeline.
//!
//! Holds the domain models, the gamification rules, the repository contracts
//! implemented by storage crates, and the services that drive synchronization,
//! rarity classification, achievement reconciliation and recommendation caching.

pub mod achievements;
pub mod classification;
pub mod clock;
pub mod errors;
pub mod gamification;
pub mod observations;
pub mod recommendations;
pub mod reconciliation;
pub mod sync;

pub use errors::{Error, Result};

#[cfg(test)]
mod test_support;
