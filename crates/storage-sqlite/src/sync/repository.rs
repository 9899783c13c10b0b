use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use bioquest_core::sync::{SyncCursor, SyncStateRepositoryTrait};
use bioquest_core::Result;

use super::model::UserSyncStateDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::user_sync_state;
use crate::utils::ts_to_db;

pub struct SyncStateRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SyncStateRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncStateRepositoryTrait for SyncStateRepository {
    fn get_cursor(&self, user_id: &str) -> Result<SyncCursor> {
        let mut conn = get_connection(&self.pool)?;
        let row = user_sync_state::table
            .find(user_id)
            .first::<UserSyncStateDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        match row {
            Some(row) => row.to_cursor(),
            None => Ok(SyncCursor::default()),
        }
    }

    async fn save_cursor(&self, user_id: &str, cursor: SyncCursor) -> Result<()> {
        let row = UserSyncStateDB::from_cursor(user_id, &cursor, ts_to_db(Utc::now()));
        self.writer
            .exec(move |conn| {
                diesel::insert_into(user_sync_state::table)
                    .values(&row)
                    .on_conflict(user_sync_state::user_id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_db;
    use chrono::TimeZone;

    #[tokio::test]
    async fn unknown_user_starts_from_empty_cursor() {
        let (pool, writer) = setup_db();
        let repo = SyncStateRepository::new(pool, writer);
        assert_eq!(repo.get_cursor("nobody").unwrap(), SyncCursor::default());
    }

    #[tokio::test]
    async fn cursor_round_trips_and_clears() {
        let (pool, writer) = setup_db();
        let repo = SyncStateRepository::new(pool, writer);
        let partial = SyncCursor {
            sync_cursor: Some(Utc.with_ymd_and_hms(2026, 7, 1, 1, 40, 0).unwrap()),
            has_more_to_sync: true,
            last_synced_at: None,
        };
        repo.save_cursor("u1", partial.clone()).await.unwrap();
        assert_eq!(repo.get_cursor("u1").unwrap(), partial);

        let drained = partial.after_run(true, None, Utc.with_ymd_and_hms(2026, 7, 2, 0, 0, 0).unwrap());
        repo.save_cursor("u1", drained.clone()).await.unwrap();
        let stored = repo.get_cursor("u1").unwrap();
        assert_eq!(stored, drained);
        assert_eq!(stored.sync_cursor, None);
    }
}
