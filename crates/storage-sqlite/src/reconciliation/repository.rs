use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use bioquest_core::reconciliation::{
    ReconciliationJob, ReconciliationRepositoryTrait, ReconciliationStatus,
};
use bioquest_core::Result;

use super::model::ReconciliationJobDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::reconciliation_jobs;
use crate::utils::{enum_to_db, ts_to_db};

pub struct ReconciliationRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ReconciliationRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    async fn settle(
        &self,
        user_id: &str,
        status: ReconciliationStatus,
        deleted: Option<i64>,
        error: Option<String>,
    ) -> Result<()> {
        let user = user_id.to_string();
        self.writer
            .exec(move |conn| {
                let target = reconciliation_jobs::table.find(&user);
                let now = Some(ts_to_db(Utc::now()));
                let status = enum_to_db(&status)?;
                match deleted {
                    Some(count) => diesel::update(target)
                        .set((
                            reconciliation_jobs::status.eq(status),
                            reconciliation_jobs::processed_at.eq(now),
                            reconciliation_jobs::deleted_count.eq(count),
                            reconciliation_jobs::last_error.eq(error),
                        ))
                        .execute(conn),
                    None => diesel::update(target)
                        .set((
                            reconciliation_jobs::status.eq(status),
                            reconciliation_jobs::processed_at.eq(now),
                            reconciliation_jobs::last_error.eq(error),
                        ))
                        .execute(conn),
                }
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ReconciliationRepositoryTrait for ReconciliationRepository {
    async fn queue(&self, user_id: &str, external_username: &str) -> Result<()> {
        let row = ReconciliationJobDB {
            user_id: user_id.to_string(),
            external_username: external_username.to_string(),
            status: enum_to_db(&ReconciliationStatus::Pending)?,
            queued_at: ts_to_db(Utc::now()),
            processed_at: None,
            deleted_count: 0,
            last_error: None,
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(reconciliation_jobs::table)
                    .values(&row)
                    .on_conflict(reconciliation_jobs::user_id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn next_pending(&self, user_id: &str) -> Result<Option<ReconciliationJob>> {
        let mut conn = get_connection(&self.pool)?;
        reconciliation_jobs::table
            .find(user_id)
            .filter(reconciliation_jobs::status.eq(enum_to_db(&ReconciliationStatus::Pending)?))
            .select(ReconciliationJobDB::as_select())
            .first::<ReconciliationJobDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(ReconciliationJob::try_from)
            .transpose()
    }

    async fn mark_completed(&self, user_id: &str, deleted: usize) -> Result<()> {
        let deleted = i64::try_from(deleted).unwrap_or(i64::MAX);
        self.settle(user_id, ReconciliationStatus::Completed, Some(deleted), None)
            .await
    }

    async fn mark_failed(&self, user_id: &str, error: String) -> Result<()> {
        self.settle(user_id, ReconciliationStatus::Failed, None, Some(error))
            .await
    }
}
