use async_trait::async_trait;
use chrono::Duration;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use bioquest_core::clock::Clock;
use bioquest_core::errors::{Error, SourceError};
use bioquest_core::observations::{Coordinates, ObservationRepositoryTrait, SourceCredentials};
use bioquest_core::recommendations::{
    distance_km, score_place, ActivityLevel, Recommendation, RecommendationEngine,
};
use bioquest_core::Result;

use crate::client::INatClient;
use crate::types::NearbyPlace;

const SEARCH_RADIUS_KM: f64 = 160.0;
const MAX_PLACES: usize = 10;
/// Places analysed concurrently.
const ANALYSIS_BATCH: usize = 3;
const RECENT_WINDOW_DAYS: i64 = 30;
const TOP_SPECIES_PER_PLACE: u32 = 50;
/// Species a user needs in an iconic taxon before a place counts as strong for it.
const STRENGTH_THRESHOLD: i64 = 5;
const MAX_STRENGTHS: usize = 3;

/// Ranks nearby iNaturalist places for a user.
pub struct INatRecommendationEngine {
    client: INatClient,
    observations: Arc<dyn ObservationRepositoryTrait>,
    clock: Arc<dyn Clock>,
}

impl INatRecommendationEngine {
    pub fn new(
        client: INatClient,
        observations: Arc<dyn ObservationRepositoryTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            observations,
            clock,
        }
    }

    async fn analyze(
        &self,
        credentials: &SourceCredentials,
        origin: Coordinates,
        place: &NearbyPlace,
        location: Coordinates,
        user_strengths: &HashMap<String, i64>,
    ) -> std::result::Result<Recommendation, SourceError> {
        let since = (self.clock.now() - Duration::days(RECENT_WINDOW_DAYS)).date_naive();
        let (species, recent) = tokio::try_join!(
            self.client
                .place_species_counts(credentials, place.id, TOP_SPECIES_PER_PLACE),
            self.client
                .place_observation_count(credentials, place.id, since),
        )?;
        let (total_species, top_species) = species;

        let mut by_iconic: HashMap<String, u64> = HashMap::new();
        for entry in &top_species {
            let iconic = entry
                .taxon
                .iconic_taxon_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string());
            *by_iconic.entry(iconic).or_default() += entry.count;
        }
        let mut ranked: Vec<(String, u64)> = by_iconic.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let strong_for: Vec<String> = ranked
            .into_iter()
            .filter(|(iconic, _)| {
                user_strengths.get(iconic).copied().unwrap_or(0) > STRENGTH_THRESHOLD
            })
            .take(MAX_STRENGTHS)
            .map(|(iconic, _)| iconic)
            .collect();

        let distance = distance_km(origin, location);
        let activity = ActivityLevel::from_recent_count(recent);
        Ok(Recommendation {
            place_id: place.id,
            place_name: place.name.clone(),
            display_name: place
                .display_name
                .clone()
                .unwrap_or_else(|| place.name.clone()),
            distance_km: distance.round(),
            coordinates: location,
            score: score_place(total_species, distance, activity, strong_for.len()),
            total_species_at_location: total_species,
            recent_activity: activity,
            strong_for,
        })
    }
}

#[async_trait]
impl RecommendationEngine for INatRecommendationEngine {
    async fn recommend(
        &self,
        user_id: &str,
        coordinates: Coordinates,
        credentials: &SourceCredentials,
    ) -> Result<Vec<Recommendation>> {
        let places = self
            .client
            .nearby_places(credentials, coordinates, SEARCH_RADIUS_KM)
            .await
            .map_err(|e| Error::Source(e.into()))?;

        let mut seen = std::collections::HashSet::new();
        let candidates: Vec<(NearbyPlace, Coordinates)> = places
            .into_iter()
            .filter(|p| seen.insert(p.id))
            .filter_map(|p| {
                let location = p.location.as_deref().and_then(|l| Coordinates::parse(l).ok())?;
                (distance_km(coordinates, location) <= SEARCH_RADIUS_KM).then_some((p, location))
            })
            .take(MAX_PLACES)
            .collect();
        debug!("{} candidate places for {}", candidates.len(), user_id);

        let strengths = self.observations.facts(user_id, None)?.species_by_iconic_taxon;

        let mut recommendations = Vec::new();
        for batch in candidates.chunks(ANALYSIS_BATCH) {
            let results = join_all(batch.iter().map(|(place, location)| {
                self.analyze(credentials, coordinates, place, *location, &strengths)
            }))
            .await;
            for (result, (place, _)) in results.into_iter().zip(batch) {
                match result {
                    Ok(recommendation) => recommendations.push(recommendation),
                    Err(e) => warn!("Skipping place {} ({}): {}", place.id, place.name, e),
                }
            }
        }

        recommendations.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(recommendations)
    }
}
