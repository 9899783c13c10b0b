use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use bioquest_core::classification::{
    ClassificationJob, ClassificationRepositoryTrait, ClassificationStatus, EnqueueOutcome,
    NewClassificationJob, QueueStatus,
};
use bioquest_core::errors::Error;
use bioquest_core::gamification::RarityOutcome;
use bioquest_core::Result;

use super::model::ClassificationJobDB;
use crate::achievements::{credit_period_points_tx, refresh_totals_tx};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::observations::apply_rarity_tx;
use crate::schema::classification_jobs;
use crate::utils::{enum_from_db, enum_to_db, ts_to_db};

fn load_job(conn: &mut SqliteConnection, job_id: &str) -> Result<ClassificationJobDB> {
    classification_jobs::table
        .find(job_id)
        .first::<ClassificationJobDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| Error::not_found(format!("classification job {}", job_id)))
}

pub struct ClassificationRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ClassificationRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ClassificationRepositoryTrait for ClassificationRepository {
    async fn enqueue(&self, job: NewClassificationJob) -> Result<EnqueueOutcome> {
        self.writer
            .exec(move |conn| {
                let existing = classification_jobs::table
                    .filter(classification_jobs::user_id.eq(&job.user_id))
                    .filter(classification_jobs::taxon_id.eq(job.taxon_id))
                    .first::<ClassificationJobDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;

                if let Some(row) = existing {
                    let tracked = ClassificationJob::try_from(row)?;
                    return Ok(match (tracked.status, tracked.result) {
                        (ClassificationStatus::Completed, Some(outcome)) => {
                            EnqueueOutcome::Classified(outcome)
                        }
                        (status, _) => EnqueueOutcome::AlreadyTracked(status),
                    });
                }

                let row = ClassificationJobDB {
                    id: Uuid::new_v4().to_string(),
                    user_id: job.user_id,
                    taxon_id: job.taxon_id,
                    taxon_name: job.taxon_name,
                    priority: job.priority,
                    status: enum_to_db(&ClassificationStatus::Pending)?,
                    attempts: 0,
                    enqueued_at: ts_to_db(Utc::now()),
                    started_at: None,
                    completed_at: None,
                    last_error: None,
                    result: None,
                };
                diesel::insert_into(classification_jobs::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(EnqueueOutcome::Queued)
            })
            .await
    }

    async fn claim_batch(
        &self,
        user_id: Option<String>,
        max_size: usize,
        max_attempts: i32,
    ) -> Result<Vec<ClassificationJob>> {
        let limit = i64::try_from(max_size).unwrap_or(i64::MAX);
        self.writer
            .exec(move |conn| {
                let pending = enum_to_db(&ClassificationStatus::Pending)?;
                let mut query = classification_jobs::table
                    .filter(classification_jobs::status.eq(pending.clone()))
                    .filter(classification_jobs::attempts.lt(max_attempts))
                    .select(classification_jobs::id)
                    .into_boxed();
                if let Some(user) = user_id {
                    query = query.filter(classification_jobs::user_id.eq(user));
                }
                let ids = query
                    .order((
                        classification_jobs::priority.desc(),
                        classification_jobs::enqueued_at.asc(),
                    ))
                    .limit(limit)
                    .load::<String>(conn)
                    .map_err(StorageError::from)?;
                if ids.is_empty() {
                    return Ok(Vec::new());
                }

                // Runs on the single writer inside one transaction, so no other
                // claim can observe these rows as pending.
                diesel::update(
                    classification_jobs::table
                        .filter(classification_jobs::id.eq_any(&ids))
                        .filter(classification_jobs::status.eq(&pending)),
                )
                .set((
                    classification_jobs::status.eq(enum_to_db(&ClassificationStatus::Processing)?),
                    classification_jobs::started_at.eq(Some(ts_to_db(Utc::now()))),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;

                let rows = classification_jobs::table
                    .filter(classification_jobs::id.eq_any(&ids))
                    .order((
                        classification_jobs::priority.desc(),
                        classification_jobs::enqueued_at.asc(),
                    ))
                    .load::<ClassificationJobDB>(conn)
                    .map_err(StorageError::from)?;
                rows.into_iter().map(ClassificationJob::try_from).collect()
            })
            .await
    }

    async fn complete(&self, job_id: &str, outcome: RarityOutcome) -> Result<i64> {
        let job_id = job_id.to_string();
        self.writer
            .exec(move |conn| {
                let job = load_job(conn, &job_id)?;
                diesel::update(classification_jobs::table.find(&job_id))
                    .set((
                        classification_jobs::status
                            .eq(enum_to_db(&ClassificationStatus::Completed)?),
                        classification_jobs::completed_at.eq(Some(ts_to_db(Utc::now()))),
                        classification_jobs::last_error.eq(None::<String>),
                        classification_jobs::result.eq(Some(serde_json::to_string(&outcome)?)),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let delta = apply_rarity_tx(conn, &job.user_id, job.taxon_id, &outcome)?;
                credit_period_points_tx(conn, &job.user_id, delta, Utc::now())?;
                refresh_totals_tx(conn, &job.user_id)?;
                Ok(delta)
            })
            .await
    }

    async fn fail(
        &self,
        job_id: &str,
        error: String,
        transient: bool,
        max_attempts: i32,
    ) -> Result<ClassificationStatus> {
        let job_id = job_id.to_string();
        self.writer
            .exec(move |conn| {
                let job = load_job(conn, &job_id)?;
                let attempts = job.attempts + 1;
                let next = if transient && attempts < max_attempts {
                    ClassificationStatus::Pending
                } else {
                    ClassificationStatus::Failed
                };
                let completed_at = (next == ClassificationStatus::Failed).then(|| ts_to_db(Utc::now()));
                diesel::update(classification_jobs::table.find(&job_id))
                    .set((
                        classification_jobs::status.eq(enum_to_db(&next)?),
                        classification_jobs::attempts.eq(attempts),
                        classification_jobs::last_error.eq(Some(error)),
                        classification_jobs::completed_at.eq(completed_at),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(next)
            })
            .await
    }

    async fn reset_stale_processing(&self) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                Ok(diesel::update(
                    classification_jobs::table.filter(
                        classification_jobs::status
                            .eq(enum_to_db(&ClassificationStatus::Processing)?),
                    ),
                )
                .set((
                    classification_jobs::status.eq(enum_to_db(&ClassificationStatus::Pending)?),
                    classification_jobs::started_at.eq(None::<String>),
                ))
                .execute(conn)
                .map_err(StorageError::from)?)
            })
            .await
    }

    fn status_counts(&self, user_id: &str) -> Result<QueueStatus> {
        let mut conn = get_connection(&self.pool)?;
        let rows = classification_jobs::table
            .filter(classification_jobs::user_id.eq(user_id))
            .group_by(classification_jobs::status)
            .select((classification_jobs::status, count_star()))
            .load::<(String, i64)>(&mut conn)
            .map_err(StorageError::from)?;

        let (mut pending, mut processing, mut completed, mut failed) = (0, 0, 0, 0);
        for (status, count) in rows {
            match enum_from_db::<ClassificationStatus>(&status)? {
                ClassificationStatus::Pending => pending = count,
                ClassificationStatus::Processing => processing = count,
                ClassificationStatus::Completed => completed = count,
                ClassificationStatus::Failed => failed = count,
            }
        }
        Ok(QueueStatus::from_counts(pending, processing, completed, failed))
    }

    fn get_job(&self, job_id: &str) -> Result<Option<ClassificationJob>> {
        let mut conn = get_connection(&self.pool)?;
        classification_jobs::table
            .find(job_id)
            .first::<ClassificationJobDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(ClassificationJob::try_from)
            .transpose()
    }

    async fn clear_completed(&self, user_id: &str) -> Result<usize> {
        let user = user_id.to_string();
        self.writer
            .exec(move |conn| {
                Ok(diesel::delete(
                    classification_jobs::table
                        .filter(classification_jobs::user_id.eq(user))
                        .filter(
                            classification_jobs::status
                                .eq(enum_to_db(&ClassificationStatus::Completed)?),
                        ),
                )
                .execute(conn)
                .map_err(StorageError::from)?)
            })
            .await
    }

    async fn retry_failed(&self, user_id: &str) -> Result<usize> {
        let user = user_id.to_string();
        self.writer
            .exec(move |conn| {
                Ok(diesel::update(
                    classification_jobs::table
                        .filter(classification_jobs::user_id.eq(user))
                        .filter(
                            classification_jobs::status
                                .eq(enum_to_db(&ClassificationStatus::Failed)?),
                        ),
                )
                .set((
                    classification_jobs::status.eq(enum_to_db(&ClassificationStatus::Pending)?),
                    classification_jobs::attempts.eq(0),
                    classification_jobs::completed_at.eq(None::<String>),
                ))
                .execute(conn)
                .map_err(StorageError::from)?)
            })
            .await
    }
}
