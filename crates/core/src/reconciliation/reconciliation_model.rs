use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Pending,
    Completed,
    Failed,
}

/// One pending unit per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationJob {
    pub user_id: String,
    pub external_username: String,
    pub status: ReconciliationStatus,
    pub queued_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub deleted_count: i64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationOutcome {
    pub processed: bool,
    pub deleted: usize,
}

#[async_trait]
pub trait ReconciliationRepositoryTrait: Send + Sync {
    /// Creates or resets the user's job to pending.
    async fn queue(&self, user_id: &str, external_username: &str) -> Result<()>;

    fn next_pending(&self, user_id: &str) -> Result<Option<ReconciliationJob>>;

    async fn mark_completed(&self, user_id: &str, deleted: usize) -> Result<()>;

    async fn mark_failed(&self, user_id: &str, error: String) -> Result<()>;
}
