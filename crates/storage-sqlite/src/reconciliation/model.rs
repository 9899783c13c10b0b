use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use bioquest_core::reconciliation::ReconciliationJob;
use bioquest_core::Result;

use crate::utils::{enum_from_db, opt_ts_from_db, ts_from_db};

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
#[diesel(table_name = crate::schema::reconciliation_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct ReconciliationJobDB {
    pub user_id: String,
    pub external_username: String,
    pub status: String,
    pub queued_at: String,
    pub processed_at: Option<String>,
    pub deleted_count: i64,
    pub last_error: Option<String>,
}

impl TryFrom<ReconciliationJobDB> for ReconciliationJob {
    type Error = bioquest_core::Error;

    fn try_from(row: ReconciliationJobDB) -> Result<Self> {
        Ok(ReconciliationJob {
            status: enum_from_db(&row.status)?,
            queued_at: ts_from_db(&row.queued_at)?,
            processed_at: opt_ts_from_db(row.processed_at.as_deref())?,
            user_id: row.user_id,
            external_username: row.external_username,
            deleted_count: row.deleted_count,
            last_error: row.last_error,
        })
    }
}
