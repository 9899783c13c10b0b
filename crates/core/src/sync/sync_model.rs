//! Sync domain models and the cursor-update rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Observations requested per page.
pub const OBSERVATIONS_PER_PAGE: u32 = 200;
/// Pause between page requests.
pub const PAGE_DELAY_MS: u64 = 500;
/// Cap for a regular incremental run.
pub const MAX_OBSERVATIONS_PER_SYNC: u64 = 500;
/// Cap for the first run of a user with no stored observations.
pub const FIRST_SYNC_LIMIT: u64 = 1000;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_size: u32,
    pub page_delay: Duration,
    pub max_observations_per_run: u64,
    pub first_sync_limit: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: OBSERVATIONS_PER_PAGE,
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
            max_observations_per_run: MAX_OBSERVATIONS_PER_SYNC,
            first_sync_limit: FIRST_SYNC_LIMIT,
        }
    }
}

/// Per-user sync watermark.
///
/// `sync_cursor` is set exactly when the last run stopped before draining the
/// source; it then holds the newest `updated_at` seen in that run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub sync_cursor: Option<DateTime<Utc>>,
    pub has_more_to_sync: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    /// Lower bound for the next fetch.
    pub fn updated_since(&self) -> Option<DateTime<Utc>> {
        self.sync_cursor.or(self.last_synced_at)
    }

    /// State after a run that finished without errors.
    pub fn after_run(
        &self,
        fetched_all: bool,
        newest_observation_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> SyncCursor {
        if fetched_all {
            SyncCursor {
                sync_cursor: None,
                has_more_to_sync: false,
                last_synced_at: Some(now),
            }
        } else {
            SyncCursor {
                sync_cursor: newest_observation_date,
                has_more_to_sync: true,
                last_synced_at: self.last_synced_at,
            }
        }
    }
}

/// What a sync run changed, handed to the achievement reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDelta {
    pub new_observation_ids: Vec<i64>,
    pub updated_observations: usize,
    pub points_awarded: i64,
    pub newest_observation_date: Option<DateTime<Utc>>,
    pub fetched_all: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub new_observations: usize,
    pub new_badges: Vec<String>,
    pub completed_quests: Vec<String>,
    pub leveled_up: bool,
    pub fetched_all: bool,
    pub total_available: u64,
    pub skipped_records: usize,
    pub queued_taxa: usize,
}
