use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::observations::{Coordinates, SourceCredentials};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
}

impl ActivityLevel {
    /// Buckets the number of observations made at a place in the last 30 days.
    pub fn from_recent_count(count: u64) -> Self {
        match count {
            101.. => Self::High,
            21..=100 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// A nearby place worth visiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub place_id: i64,
    pub place_name: String,
    pub display_name: String,
    pub distance_km: f64,
    pub coordinates: Coordinates,
    pub score: i64,
    pub total_species_at_location: u64,
    pub recent_activity: ActivityLevel,
    pub strong_for: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
    pub cached: bool,
    pub coordinates: Option<Coordinates>,
}

impl RecommendationsResponse {
    pub fn empty() -> Self {
        Self {
            recommendations: Vec::new(),
            cached: false,
            coordinates: None,
        }
    }
}

/// The expensive computation the cache shields.
#[async_trait]
pub trait RecommendationEngine: Send + Sync {
    async fn recommend(
        &self,
        user_id: &str,
        coordinates: Coordinates,
        credentials: &SourceCredentials,
    ) -> Result<Vec<Recommendation>>;
}

/// Great-circle distance.
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Fixed places used when no external source is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureRecommendationEngine;

struct FixturePlace {
    id: i64,
    name: &'static str,
    display_name: &'static str,
    latitude: f64,
    longitude: f64,
    species: u64,
    activity: ActivityLevel,
    strong_for: &'static [&'static str],
}

const FIXTURE_PLACES: &[FixturePlace] = &[
    FixturePlace {
        id: 97394,
        name: "Muir Woods National Monument",
        display_name: "Muir Woods National Monument, California, US",
        latitude: 37.8963,
        longitude: -122.5809,
        species: 342,
        activity: ActivityLevel::High,
        strong_for: &["Plantae", "Aves", "Fungi"],
    },
    FixturePlace {
        id: 72645,
        name: "Point Reyes National Seashore",
        display_name: "Point Reyes National Seashore, California, US",
        latitude: 38.0682,
        longitude: -122.8778,
        species: 1187,
        activity: ActivityLevel::High,
        strong_for: &["Aves", "Mammalia", "Mollusca"],
    },
    FixturePlace {
        id: 6939,
        name: "Golden Gate Park",
        display_name: "Golden Gate Park, San Francisco, CA, US",
        latitude: 37.7694,
        longitude: -122.4862,
        species: 611,
        activity: ActivityLevel::Medium,
        strong_for: &["Aves", "Insecta"],
    },
];

#[async_trait]
impl RecommendationEngine for FixtureRecommendationEngine {
    async fn recommend(
        &self,
        _user_id: &str,
        coordinates: Coordinates,
        _credentials: &SourceCredentials,
    ) -> Result<Vec<Recommendation>> {
        let mut places: Vec<Recommendation> = FIXTURE_PLACES
            .iter()
            .map(|place| {
                let location = Coordinates {
                    latitude: place.latitude,
                    longitude: place.longitude,
                };
                let distance = distance_km(coordinates, location);
                Recommendation {
                    place_id: place.id,
                    place_name: place.name.to_string(),
                    display_name: place.display_name.to_string(),
                    distance_km: distance.round(),
                    coordinates: location,
                    score: score_place(place.species, distance, place.activity, place.strong_for.len()),
                    total_species_at_location: place.species,
                    recent_activity: place.activity,
                    strong_for: place.strong_for.iter().map(|s| s.to_string()).collect(),
                }
            })
            .collect();
        places.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(places)
    }
}

/// Ranks a place by species richness, closeness and recent activity.
pub fn score_place(species: u64, distance_km: f64, activity: ActivityLevel, strengths: usize) -> i64 {
    let richness = (species as f64).sqrt().min(40.0);
    let proximity = (30.0 - distance_km / 10.0).max(0.0);
    let activity = match activity {
        ActivityLevel::High => 20.0,
        ActivityLevel::Medium => 12.0,
        ActivityLevel::Low => 5.0,
    };
    (richness + proximity + activity + strengths as f64 * 5.0).round() as i64
}
