use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use bioquest_core::classification::ClassificationJob;
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
#[diesel(table_name = crate::schema::classification_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ClassificationJobDB {
    pub id: String,
    pub user_id: String,
    pub taxon_id: i64,
    pub taxon_name: Option<String>,
    pub priority: i64,
    pub status: String,
    pub attempts: i32,
    pub enqueued_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub last_error: Option<String>,
    /// JSON-encoded `RarityOutcome`.
    pub result: Option<String>,
}

impl TryFrom<ClassificationJobDB> for ClassificationJob {
    type Error = bioquest_core::Error;

    fn try_from(row: ClassificationJobDB) -> Result<Self> {
        Ok(ClassificationJob {
            id: row.id,
            user_id: row.user_id,
            taxon_id: row.taxon_id,
            taxon_name: row.taxon_name,
            priority: row.priority,
            status: enum_from_db(&row.status)?,
            attempts: row.attempts,
            enqueued_at: ts_from_db(&row.enqueued_at)?,
            started_at: opt_ts_from_db(row.started_at.as_deref())?,
            completed_at: opt_ts_from_db(row.completed_at.as_deref())?,
            last_error: row.last_error,
            result: row
                .result
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }
}
