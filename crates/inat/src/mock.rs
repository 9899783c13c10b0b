//! Fixture-backed source for running without iNaturalist credentials.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;

use bioquest_core::errors::SourceError;
use bioquest_core::observations::{
    ObservationPage, ObservationSource, PageRequest, RawObservation, RawTaxon, SourceCredentials,
};

struct FixtureSpecies {
    name: &'static str,
    common_name: &'static str,
    iconic_taxon: &'static str,
    global_count: u64,
}

const SPECIES: &[FixtureSpecies] = &[
    FixtureSpecies { name: "Quercus robur", common_name: "English Oak", iconic_taxon: "Plantae", global_count: 48_000 },
    FixtureSpecies { name: "Parus major", common_name: "Great Tit", iconic_taxon: "Aves", global_count: 91_000 },
    FixtureSpecies { name: "Vulpes vulpes", common_name: "Red Fox", iconic_taxon: "Mammalia", global_count: 7_400 },
    FixtureSpecies { name: "Strix aluco", common_name: "Tawny Owl", iconic_taxon: "Aves", global_count: 1_800 },
    FixtureSpecies { name: "Salamandra salamandra", common_name: "Fire Salamander", iconic_taxon: "Amphibia", global_count: 420 },
    FixtureSpecies { name: "Amanita muscaria", common_name: "Fly Agaric", iconic_taxon: "Fungi", global_count: 12_500 },
    FixtureSpecies { name: "Lucanus cervus", common_name: "Stag Beetle", iconic_taxon: "Insecta", global_count: 960 },
    FixtureSpecies { name: "Lynx lynx", common_name: "Eurasian Lynx", iconic_taxon: "Mammalia", global_count: 85 },
    FixtureSpecies { name: "Aquila chrysaetos", common_name: "Golden Eagle", iconic_taxon: "Aves", global_count: 3_100 },
    FixtureSpecies { name: "Boletus edulis", common_name: "Porcini", iconic_taxon: "Fungi", global_count: 6 },
];

const PLACES: &[(&str, &str)] = &[
    ("Hyde Park, London", "51.5073,-0.1657"),
    ("Black Forest, Germany", "48.2775,8.1860"),
    ("Scottish Highlands", "57.1200,-4.7100"),
    ("Central Park, New York", "40.7829,-73.9654"),
];

/// First fixture taxon id; species `i` has id `TAXON_ID_BASE + i`.
const TAXON_ID_BASE: i64 = 100_000;
const OBSERVATION_ID_BASE: i64 = 1_000_000;

/// Serves a fixed, deterministic set of observations for any username.
#[derive(Debug, Clone)]
pub struct MockObservationSource {
    records: Vec<RawObservation>,
}

impl MockObservationSource {
    /// `count` observations, one minute apart in update order, ending at `newest`.
    pub fn new(count: usize, newest: DateTime<Utc>) -> Self {
        let count_i64 = i64::try_from(count).unwrap_or(i64::MAX);
        let records = (0..count_i64)
            .map(|i| {
                let index = (i as usize) % SPECIES.len();
                let species = &SPECIES[index];
                let (place, location) = PLACES[(i as usize) % PLACES.len()];
                let updated_at = newest - Duration::minutes(count_i64 - 1 - i);
                let quality = match i % 20 {
                    0 => "casual",
                    1..=3 => "needs_id",
                    _ => "research",
                };
                RawObservation {
                    id: Some(OBSERVATION_ID_BASE + i),
                    species_guess: Some(species.common_name.to_string()),
                    taxon: Some(RawTaxon {
                        id: Some(TAXON_ID_BASE + index as i64),
                        name: Some(species.name.to_string()),
                        preferred_common_name: Some(species.common_name.to_string()),
                        rank: Some("species".to_string()),
                        iconic_taxon_name: Some(species.iconic_taxon.to_string()),
                    }),
                    observed_on: Some(
                        (updated_at - Duration::days(i % 30))
                            .date_naive()
                            .format("%Y-%m-%d")
                            .to_string(),
                    ),
                    updated_at: Some(updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    quality_grade: Some(quality.to_string()),
                    photos: (0..(i % 5)).map(|p| json!({ "id": p })).collect(),
                    location: Some(location.to_string()),
                    place_guess: Some(place.to_string()),
                    place_ids: Vec::new(),
                }
            })
            .collect();
        Self { records }
    }
}

impl Default for MockObservationSource {
    fn default() -> Self {
        Self::new(50, Utc::now())
    }
}

#[async_trait]
impl ObservationSource for MockObservationSource {
    async fn fetch_observations(
        &self,
        _credentials: &SourceCredentials,
        request: &PageRequest,
    ) -> Result<ObservationPage, SourceError> {
        let since = request.updated_since.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
        // Fixture timestamps share one format, so text order is time order.
        let matching: Vec<&RawObservation> = self
            .records
            .iter()
            .filter(|r| match (&since, &r.updated_at) {
                (Some(since), Some(updated)) => updated >= since,
                _ => true,
            })
            .collect();

        let per_page = request.per_page.max(1) as usize;
        let start = (request.page.max(1) as usize - 1) * per_page;
        Ok(ObservationPage {
            total_results: matching.len() as u64,
            page: request.page,
            per_page: request.per_page,
            results: matching
                .into_iter()
                .skip(start)
                .take(per_page)
                .cloned()
                .collect(),
        })
    }

    async fn taxon_observation_count(
        &self,
        taxon_id: i64,
        place_id: Option<i64>,
    ) -> Result<u64, SourceError> {
        let global = usize::try_from(taxon_id - TAXON_ID_BASE)
            .ok()
            .and_then(|i| SPECIES.get(i))
            .map(|s| s.global_count)
            .unwrap_or(10_000);
        Ok(match place_id {
            Some(_) => global / 10,
            None => global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioquest_core::observations::Observation;
    use chrono::TimeZone;

    fn newest() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap()
    }

    fn request(page: u32, per_page: u32, updated_since: Option<DateTime<Utc>>) -> PageRequest {
        PageRequest {
            username: "anyone".into(),
            page,
            per_page,
            updated_since,
        }
    }

    #[tokio::test]
    async fn fixtures_are_valid_and_paginate() {
        let source = MockObservationSource::new(25, newest());
        let creds = SourceCredentials::default();

        let first = source.fetch_observations(&creds, &request(1, 10, None)).await.unwrap();
        assert_eq!(first.total_results, 25);
        assert_eq!(first.results.len(), 10);
        let last = source.fetch_observations(&creds, &request(3, 10, None)).await.unwrap();
        assert_eq!(last.results.len(), 5);
        assert_eq!(last.results[4].updated_at.as_deref(), Some("2026-07-09T12:00:00Z"));

        for raw in first.results {
            assert!(Observation::from_raw("u1", raw).is_ok());
        }
    }

    #[tokio::test]
    async fn updated_since_is_inclusive() {
        let source = MockObservationSource::new(25, newest());
        let page = source
            .fetch_observations(
                &SourceCredentials::default(),
                &request(1, 50, Some(newest() - Duration::minutes(2))),
            )
            .await
            .unwrap();
        assert_eq!(page.total_results, 3);
    }

    #[tokio::test]
    async fn fixture_counts_span_the_rarity_tiers() {
        let source = MockObservationSource::default();
        assert_eq!(source.taxon_observation_count(TAXON_ID_BASE + 9, None).await.unwrap(), 6);
        assert_eq!(source.taxon_observation_count(TAXON_ID_BASE + 7, Some(1)).await.unwrap(), 8);
        assert_eq!(source.taxon_observation_count(42, None).await.unwrap(), 10_000);
    }
}
