use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use super::{Coordinates, Observation, ObservationFacts, ObservationPage};
use crate::errors::{Result, SourceError};
use crate::gamification::RarityOutcome;

/// Caller credentials forwarded to the external source.
#[derive(Clone, Default)]
pub struct SourceCredentials {
    pub access_token: Option<String>,
}

impl SourceCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
        }
    }
}

impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Request for one page of a user's observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub username: String,
    pub page: u32,
    pub per_page: u32,
    pub updated_since: Option<DateTime<Utc>>,
}

/// Paginated, rate-limited read API of externally hosted observations.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn fetch_observations(
        &self,
        credentials: &SourceCredentials,
        request: &PageRequest,
    ) -> std::result::Result<ObservationPage, SourceError>;

    /// Number of observations of a taxon, globally or within a place.
    async fn taxon_observation_count(
        &self,
        taxon_id: i64,
        place_id: Option<i64>,
    ) -> std::result::Result<u64, SourceError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted_ids: Vec<i64>,
    pub updated: usize,
    /// Points carried by the newly inserted rows.
    pub inserted_points: i64,
}

#[async_trait]
pub trait ObservationRepositoryTrait: Send + Sync {
    /// Writes one page of observations in a single transaction. Rows that
    /// already exist keep their rarity; their points are recomputed. Points of
    /// newly inserted rows are credited to the user's weekly and monthly
    /// totals in the same transaction.
    async fn upsert_observations(
        &self,
        user_id: &str,
        observations: Vec<Observation>,
    ) -> Result<UpsertSummary>;

    /// Marks the user's pending observations of `taxon_id` as classified and
    /// credits the change in awarded points to the period totals. Returns
    /// that change.
    async fn apply_rarity(
        &self,
        user_id: &str,
        taxon_id: i64,
        outcome: RarityOutcome,
    ) -> Result<i64>;

    async fn delete_observations(&self, user_id: &str, ids: Vec<i64>) -> Result<usize>;

    fn count_for_user(&self, user_id: &str) -> Result<i64>;

    fn count_pending_rarity(&self, user_id: &str) -> Result<i64>;

    fn list_ids(&self, user_id: &str) -> Result<Vec<i64>>;

    /// Aggregates over observations made on or after `since` (all when `None`).
    fn facts(&self, user_id: &str, since: Option<DateTime<Utc>>) -> Result<ObservationFacts>;

    fn latest_coordinates(&self, user_id: &str) -> Result<Option<Coordinates>>;
}
