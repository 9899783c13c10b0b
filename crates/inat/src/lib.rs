//! iNaturalist-backed implementation of the observation source.
//!
//! [`INatClient`] talks to the public API under a per-minute request quota.
//! [`MockObservationSource`] serves fixture data when no API client is
//! configured.

mod client;
mod error;
mod mock;
mod recommendations;
mod types;

#[cfg(test)]
mod test_server;

pub use client::{INatClient, DEFAULT_BASE_URL, DEFAULT_REQUESTS_PER_MINUTE};
pub use error::{INatError, Result};
pub use mock::MockObservationSource;
pub use recommendations::INatRecommendationEngine;
pub use types::{NearbyPlace, SpeciesCount};
