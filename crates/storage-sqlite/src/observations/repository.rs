use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use bioquest_core::gamification::RarityOutcome;
use bioquest_core::observations::{
    Coordinates, Observation, ObservationFacts, ObservationRepositoryTrait, RarityStatus,
    UpsertSummary,
};
use bioquest_core::Result;

use super::model::ObservationDB;
use crate::achievements::{credit_period_points_tx, refresh_totals_tx};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::observations;
use crate::utils::{date_to_db, enum_to_db};

/// Applies a rarity outcome to every pending observation of a taxon owned by
/// `user`. Runs inside the caller's transaction. Returns the point change.
pub(crate) fn apply_rarity_tx(
    conn: &mut SqliteConnection,
    user: &str,
    taxon: i64,
    outcome: &RarityOutcome,
) -> Result<i64> {
    let pending = enum_to_db(&RarityStatus::Pending)?;
    let rows = observations::table
        .filter(observations::user_id.eq(user))
        .filter(observations::taxon_id.eq(taxon))
        .filter(observations::rarity_status.eq(&pending))
        .select(ObservationDB::as_select())
        .load::<ObservationDB>(conn)
        .map_err(StorageError::from)?;

    let mut delta = 0;
    for row in rows {
        let mut observation = row.into_domain()?;
        let before = observation.points_awarded;
        observation.apply_rarity(outcome);
        delta += observation.points_awarded - before;

        let updated = ObservationDB::from_domain(&observation)?;
        diesel::update(observations::table.find((&updated.user_id, updated.id)))
            .set(&updated)
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(delta)
}

pub struct ObservationRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ObservationRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        ObservationRepository { pool, writer }
    }

    pub fn get(&self, user: &str, observation_id: i64) -> Result<Option<Observation>> {
        let mut conn = get_connection(&self.pool)?;
        observations::table
            .find((user, observation_id))
            .select(ObservationDB::as_select())
            .first::<ObservationDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(ObservationDB::into_domain)
            .transpose()
    }
}

#[async_trait]
impl ObservationRepositoryTrait for ObservationRepository {
    async fn upsert_observations(
        &self,
        user_id: &str,
        incoming: Vec<Observation>,
    ) -> Result<UpsertSummary> {
        let user = user_id.to_string();
        self.writer
            .exec(move |conn| {
                let mut summary = UpsertSummary::default();
                for mut observation in incoming {
                    let stored = observations::table
                        .find((&user, observation.id))
                        .select(ObservationDB::as_select())
                        .first::<ObservationDB>(conn)
                        .optional()
                        .map_err(StorageError::from)?;

                    match stored {
                        Some(row) => {
                            observation.inherit_rarity(&row.into_domain()?);
                            summary.updated += 1;
                        }
                        None => {
                            summary.inserted_ids.push(observation.id);
                            summary.inserted_points += observation.points_awarded;
                        }
                    }

                    let row = ObservationDB::from_domain(&observation)?;
                    diesel::insert_into(observations::table)
                        .values(&row)
                        .on_conflict((observations::user_id, observations::id))
                        .do_update()
                        .set(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                credit_period_points_tx(conn, &user, summary.inserted_points, Utc::now())?;
                Ok(summary)
            })
            .await
    }

    async fn apply_rarity(
        &self,
        user_id: &str,
        taxon_id: i64,
        outcome: RarityOutcome,
    ) -> Result<i64> {
        let user = user_id.to_string();
        self.writer
            .exec(move |conn| {
                let delta = apply_rarity_tx(conn, &user, taxon_id, &outcome)?;
                credit_period_points_tx(conn, &user, delta, Utc::now())?;
                refresh_totals_tx(conn, &user)?;
                Ok(delta)
            })
            .await
    }

    async fn delete_observations(&self, user_id: &str, ids: Vec<i64>) -> Result<usize> {
        let user = user_id.to_string();
        self.writer
            .exec(move |conn| {
                let mut deleted = 0;
                // Chunked to stay under SQLite's bound-parameter limit.
                for chunk in ids.chunks(500) {
                    deleted += diesel::delete(
                        observations::table
                            .filter(observations::user_id.eq(&user))
                            .filter(observations::id.eq_any(chunk)),
                    )
                    .execute(conn)
                    .map_err(StorageError::from)?;
                }
                Ok(deleted)
            })
            .await
    }

    fn count_for_user(&self, user_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        Ok(observations::table
            .filter(observations::user_id.eq(user_id))
            .select(count_star())
            .first::<i64>(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn count_pending_rarity(&self, user_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let pending = enum_to_db(&RarityStatus::Pending)?;
        Ok(observations::table
            .filter(observations::user_id.eq(user_id))
            .filter(observations::rarity_status.eq(pending))
            .select(count_star())
            .first::<i64>(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn list_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(observations::table
            .filter(observations::user_id.eq(user_id))
            .select(observations::id)
            .order(observations::id.asc())
            .load::<i64>(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn facts(&self, user_id: &str, since: Option<DateTime<Utc>>) -> Result<ObservationFacts> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = observations::table
            .filter(observations::user_id.eq(user_id))
            .select(ObservationDB::as_select())
            .into_boxed();
        if let Some(since) = since {
            query = query.filter(observations::observed_on.ge(date_to_db(since.date_naive())));
        }
        let rows = query
            .load::<ObservationDB>(&mut conn)
            .map_err(StorageError::from)?;
        let parsed = rows
            .into_iter()
            .map(ObservationDB::into_domain)
            .collect::<Result<Vec<_>>>()?;
        Ok(ObservationFacts::from_observations(&parsed))
    }

    fn latest_coordinates(&self, user_id: &str) -> Result<Option<Coordinates>> {
        let mut conn = get_connection(&self.pool)?;
        let row = observations::table
            .filter(observations::user_id.eq(user_id))
            .filter(observations::latitude.is_not_null())
            .filter(observations::longitude.is_not_null())
            .order((observations::observed_on.desc(), observations::updated_at.desc()))
            .select((observations::latitude, observations::longitude))
            .first::<(Option<f64>, Option<f64>)>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(match row {
            Some((Some(latitude), Some(longitude))) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        })
    }
}
