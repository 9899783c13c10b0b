use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use bioquest_core::sync::SyncCursor;
use bioquest_core::Result;

use crate::utils::{opt_ts_from_db, ts_to_db};

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
#[diesel(primary_key(user_id))]
#[diesel(table_name = crate::schema::user_sync_state)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct UserSyncStateDB {
    pub user_id: String,
    pub sync_cursor: Option<String>,
    pub has_more_to_sync: bool,
    pub last_synced_at: Option<String>,
    pub updated_at: String,
}

impl UserSyncStateDB {
    pub fn from_cursor(user_id: &str, cursor: &SyncCursor, updated_at: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            sync_cursor: cursor.sync_cursor.map(ts_to_db),
            has_more_to_sync: cursor.has_more_to_sync,
            last_synced_at: cursor.last_synced_at.map(ts_to_db),
            updated_at,
        }
    }

    pub fn to_cursor(&self) -> Result<SyncCursor> {
        Ok(SyncCursor {
            sync_cursor: opt_ts_from_db(self.sync_cursor.as_deref())?,
            has_more_to_sync: self.has_more_to_sync,
            last_synced_at: opt_ts_from_db(self.last_synced_at.as_deref())?,
        })
    }
}
