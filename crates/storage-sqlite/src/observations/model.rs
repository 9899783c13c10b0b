use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use bioquest_core::observations::{Coordinates, Observation, Taxon};
use bioquest_core::Result;

use crate::utils::{date_from_db, date_to_db, enum_from_db, enum_to_db, ts_from_db, ts_to_db};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(user_id, id))]
#[diesel(table_name = crate::schema::observations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct ObservationDB {
    pub user_id: String,
    pub id: i64,
    pub species_guess: Option<String>,
    pub taxon_id: Option<i64>,
    pub taxon_name: Option<String>,
    pub common_name: Option<String>,
    pub taxon_rank: Option<String>,
    pub iconic_taxon: Option<String>,
    pub observed_on: Option<String>,
    pub updated_at: String,
    pub quality_grade: String,
    pub photos_count: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_guess: Option<String>,
    pub rarity: Option<String>,
    pub rarity_status: String,
    pub is_first_global: bool,
    pub is_first_regional: bool,
    pub points_awarded: i64,
}

impl ObservationDB {
    pub fn from_domain(observation: &Observation) -> Result<Self> {
        let taxon = observation.taxon.as_ref();
        Ok(Self {
            user_id: observation.user_id.clone(),
            id: observation.id,
            species_guess: observation.species_guess.clone(),
            taxon_id: taxon.map(|t| t.id),
            taxon_name: taxon.map(|t| t.name.clone()),
            common_name: taxon.and_then(|t| t.common_name.clone()),
            taxon_rank: taxon.and_then(|t| t.rank.clone()),
            iconic_taxon: taxon.and_then(|t| t.iconic_taxon.clone()),
            observed_on: observation.observed_on.map(date_to_db),
            updated_at: ts_to_db(observation.updated_at),
            quality_grade: enum_to_db(&observation.quality_grade)?,
            photos_count: i32::try_from(observation.photos_count).unwrap_or(i32::MAX),
            latitude: observation.coordinates.map(|c| c.latitude),
            longitude: observation.coordinates.map(|c| c.longitude),
            place_guess: observation.place_guess.clone(),
            rarity: observation.rarity.as_ref().map(enum_to_db).transpose()?,
            rarity_status: enum_to_db(&observation.rarity_status)?,
            is_first_global: observation.is_first_global,
            is_first_regional: observation.is_first_regional,
            points_awarded: observation.points_awarded,
        })
    }

    pub fn into_domain(self) -> Result<Observation> {
        let taxon = self.taxon_id.map(|id| Taxon {
            id,
            name: self.taxon_name.unwrap_or_else(|| format!("taxon-{id}")),
            common_name: self.common_name,
            rank: self.taxon_rank,
            iconic_taxon: self.iconic_taxon,
        });
        let coordinates = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Ok(Observation {
            id: self.id,
            user_id: self.user_id,
            species_guess: self.species_guess,
            taxon,
            observed_on: self.observed_on.as_deref().map(date_from_db).transpose()?,
            updated_at: ts_from_db(&self.updated_at)?,
            quality_grade: enum_from_db(&self.quality_grade)?,
            photos_count: u32::try_from(self.photos_count).unwrap_or(0),
            coordinates,
            place_guess: self.place_guess,
            rarity: self.rarity.as_deref().map(enum_from_db).transpose()?,
            rarity_status: enum_from_db(&self.rarity_status)?,
            is_first_global: self.is_first_global,
            is_first_regional: self.is_first_regional,
            points_awarded: self.points_awarded,
        })
    }
}
