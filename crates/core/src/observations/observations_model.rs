//! Observation domain models and the ingestion-boundary parser.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::{Error, Result};
use crate::gamification::{
    calculate_observation_points, Rarity, RarityOutcome, FIRST_GLOBAL_BONUS, FIRST_REGIONAL_BONUS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Research,
    NeedsId,
    Casual,
}

impl QualityGrade {
    /// Unknown grades are treated as casual.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("research") => Self::Research,
            Some("needs_id") => Self::NeedsId,
            _ => Self::Casual,
        }
    }
}

/// Whether an observation still waits for its taxon's rarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RarityStatus {
    Pending,
    Classified,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::validation(format!("latitude out of range: {latitude}")));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::validation(format!(
                "longitude out of range: {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parses the `"lat,lng"` form used by the external API.
    pub fn parse(value: &str) -> Result<Self> {
        let (lat, lng) = value
            .split_once(',')
            .ok_or_else(|| Error::validation(format!("malformed location '{value}'")))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::validation(format!("malformed latitude in '{value}'")))?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::validation(format!("malformed longitude in '{value}'")))?;
        Self::new(lat, lng)
    }
}

/// Taxon fields as delivered by the external API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTaxon {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub preferred_common_name: Option<String>,
    pub rank: Option<String>,
    pub iconic_taxon_name: Option<String>,
}

/// Observation payload as delivered by the external API. Every field is
/// optional until [`Observation::from_raw`] validates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub id: Option<i64>,
    pub species_guess: Option<String>,
    pub taxon: Option<RawTaxon>,
    pub observed_on: Option<String>,
    pub updated_at: Option<String>,
    pub quality_grade: Option<String>,
    #[serde(default)]
    pub photos: Vec<serde_json::Value>,
    pub location: Option<String>,
    pub place_guess: Option<String>,
    #[serde(default)]
    pub place_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxon {
    pub id: i64,
    pub name: String,
    pub common_name: Option<String>,
    pub rank: Option<String>,
    pub iconic_taxon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: i64,
    pub user_id: String,
    pub species_guess: Option<String>,
    pub taxon: Option<Taxon>,
    pub observed_on: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
    pub quality_grade: QualityGrade,
    pub photos_count: u32,
    pub coordinates: Option<Coordinates>,
    pub place_guess: Option<String>,
    pub rarity: Option<Rarity>,
    pub rarity_status: RarityStatus,
    pub is_first_global: bool,
    pub is_first_regional: bool,
    pub points_awarded: i64,
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::validation(format!("invalid {field} '{value}': {e}")))
}

impl Observation {
    /// Validates an external record. Records without an id or update
    /// timestamp are rejected; malformed optional fields are dropped.
    pub fn from_raw(user_id: &str, raw: RawObservation) -> Result<Self> {
        let id = raw
            .id
            .filter(|id| *id > 0)
            .ok_or_else(|| Error::validation("observation is missing an id"))?;
        let updated_at = raw
            .updated_at
            .as_deref()
            .ok_or_else(|| Error::validation(format!("observation {id} has no updated_at")))
            .and_then(|value| parse_timestamp("updated_at", value))?;

        let taxon = raw.taxon.and_then(|t| {
            let taxon_id = t.id?;
            Some(Taxon {
                id: taxon_id,
                name: t.name.unwrap_or_else(|| format!("taxon-{taxon_id}")),
                common_name: t.preferred_common_name,
                rank: t.rank,
                iconic_taxon: t.iconic_taxon_name,
            })
        });
        let observed_on = raw
            .observed_on
            .as_deref()
            .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok());
        let coordinates = raw
            .location
            .as_deref()
            .and_then(|value| Coordinates::parse(value).ok());
        let quality_grade = QualityGrade::parse(raw.quality_grade.as_deref());
        let photos_count = u32::try_from(raw.photos.len()).unwrap_or(u32::MAX);

        // Without a taxon there is nothing to classify.
        let rarity_status = if taxon.is_some() {
            RarityStatus::Pending
        } else {
            RarityStatus::Classified
        };

        Ok(Self {
            id,
            user_id: user_id.to_string(),
            species_guess: raw.species_guess,
            taxon,
            observed_on,
            updated_at,
            quality_grade,
            photos_count,
            coordinates,
            place_guess: raw.place_guess,
            rarity: None,
            rarity_status,
            is_first_global: false,
            is_first_regional: false,
            points_awarded: calculate_observation_points(quality_grade, photos_count, None)
                .total(),
        })
    }

    pub fn taxon_id(&self) -> Option<i64> {
        self.taxon.as_ref().map(|t| t.id)
    }

    /// Applies a classification result and recomputes the awarded points.
    pub fn apply_rarity(&mut self, outcome: &RarityOutcome) {
        self.rarity = Some(outcome.rarity);
        self.rarity_status = RarityStatus::Classified;
        self.is_first_global = outcome.is_first_global;
        self.is_first_regional = outcome.is_first_regional;
        self.points_awarded =
            calculate_observation_points(self.quality_grade, self.photos_count, Some(outcome))
                .total();
    }

    /// Keeps the classification of the stored copy of this record when the
    /// taxon is unchanged. A re-identified record goes back to pending.
    pub fn inherit_rarity(&mut self, stored: &Observation) {
        if stored.rarity_status != RarityStatus::Classified || stored.taxon_id() != self.taxon_id()
        {
            return;
        }
        self.rarity = stored.rarity;
        self.rarity_status = RarityStatus::Classified;
        self.is_first_global = stored.is_first_global;
        self.is_first_regional = stored.is_first_regional;

        let mut bonus = self.rarity.map_or(0, Rarity::bonus_points);
        if self.is_first_global {
            bonus += FIRST_GLOBAL_BONUS;
        } else if self.is_first_regional {
            bonus += FIRST_REGIONAL_BONUS;
        }
        self.points_awarded =
            calculate_observation_points(self.quality_grade, self.photos_count, None).total()
                + bonus;
    }
}

/// One page of results from the external source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationPage {
    pub total_results: u64,
    pub page: u32,
    pub per_page: u32,
    #[serde(default)]
    pub results: Vec<RawObservation>,
}

/// Aggregates over a user's stored observations used by badge and quest rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationFacts {
    pub total_observations: i64,
    pub unique_species: i64,
    pub research_grade: i64,
    pub with_photos: i64,
    pub rare_or_better: i64,
    pub legendary_or_better: i64,
    pub observation_points: i64,
    pub species_by_iconic_taxon: HashMap<String, i64>,
    pub observation_dates: Vec<NaiveDate>,
}

impl ObservationFacts {
    pub fn from_observations<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Self {
        let mut facts = Self::default();
        let mut species = HashSet::new();
        let mut species_by_iconic: HashMap<String, HashSet<i64>> = HashMap::new();
        let mut dates = HashSet::new();

        for observation in observations {
            facts.total_observations += 1;
            facts.observation_points += observation.points_awarded;
            if observation.quality_grade == QualityGrade::Research {
                facts.research_grade += 1;
            }
            if observation.photos_count > 0 {
                facts.with_photos += 1;
            }
            if let Some(rarity) = observation.rarity {
                if rarity.is_rare_or_better() {
                    facts.rare_or_better += 1;
                }
                if rarity.is_legendary_or_better() {
                    facts.legendary_or_better += 1;
                }
            }
            if let Some(taxon) = &observation.taxon {
                species.insert(taxon.id);
                if let Some(iconic) = &taxon.iconic_taxon {
                    species_by_iconic
                        .entry(iconic.clone())
                        .or_default()
                        .insert(taxon.id);
                }
            }
            if let Some(date) = observation.observed_on {
                dates.insert(date);
            }
        }

        facts.unique_species = species.len() as i64;
        facts.species_by_iconic_taxon = species_by_iconic
            .into_iter()
            .map(|(name, ids)| (name, ids.len() as i64))
            .collect();
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        dates.sort_unstable();
        facts.observation_dates = dates;
        facts
    }

    pub fn species_for(&self, iconic_taxon: &str) -> i64 {
        self.species_by_iconic_taxon
            .get(iconic_taxon)
            .copied()
            .unwrap_or(0)
    }
}
