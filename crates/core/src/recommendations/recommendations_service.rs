use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use super::{
    CacheStats, Recommendation, RecommendationCache, RecommendationEngine,
    RecommendationsResponse,
};
use crate::errors::Result;
use crate::observations::{Coordinates, ObservationRepositoryTrait, SourceCredentials};

#[async_trait]
pub trait RecommendationServiceTrait: Send + Sync {
    /// Uses `coordinates` when given, else the user's latest observation
    /// location. No location at all yields an empty, uncached response.
    async fn recommendations(
        &self,
        user_id: &str,
        coordinates: Option<Coordinates>,
        credentials: &SourceCredentials,
    ) -> Result<RecommendationsResponse>;

    fn clear_user(&self, user_id: &str) -> usize;

    fn stats(&self) -> CacheStats;
}

pub struct RecommendationService {
    cache: Arc<RecommendationCache<Vec<Recommendation>>>,
    engine: Arc<dyn RecommendationEngine>,
    observation_repository: Arc<dyn ObservationRepositoryTrait>,
}

impl RecommendationService {
    pub fn new(
        cache: Arc<RecommendationCache<Vec<Recommendation>>>,
        engine: Arc<dyn RecommendationEngine>,
        observation_repository: Arc<dyn ObservationRepositoryTrait>,
    ) -> Self {
        Self {
            cache,
            engine,
            observation_repository,
        }
    }
}

#[async_trait]
impl RecommendationServiceTrait for RecommendationService {
    async fn recommendations(
        &self,
        user_id: &str,
        coordinates: Option<Coordinates>,
        credentials: &SourceCredentials,
    ) -> Result<RecommendationsResponse> {
        let coordinates = match coordinates {
            Some(c) => c,
            None => match self.observation_repository.latest_coordinates(user_id)? {
                Some(c) => c,
                None => return Ok(RecommendationsResponse::empty()),
            },
        };

        if let Some(recommendations) = self.cache.get(user_id, coordinates) {
            debug!("[RecommendationCache] Hit for {}", user_id);
            return Ok(RecommendationsResponse {
                recommendations,
                cached: true,
                coordinates: Some(coordinates),
            });
        }

        let recommendations = self
            .engine
            .recommend(user_id, coordinates, credentials)
            .await?;
        self.cache
            .set(user_id, coordinates, recommendations.clone());
        Ok(RecommendationsResponse {
            recommendations,
            cached: false,
            coordinates: Some(coordinates),
        })
    }

    fn clear_user(&self, user_id: &str) -> usize {
        self.cache.clear_user(user_id)
    }

    fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
