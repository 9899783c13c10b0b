//! Classification job models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::gamification::{Rarity, RarityOutcome};

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const MAX_BATCH_SIZE: usize = 50;
/// Attempts before a job settles as failed.
pub const MAX_ATTEMPTS: i32 = 3;
/// Pause between taxa inside a batch, to stay under the source rate limit.
pub const JOB_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationJob {
    pub id: String,
    pub user_id: String,
    pub taxon_id: i64,
    pub taxon_name: Option<String>,
    /// Higher runs first.
    pub priority: i64,
    pub status: ClassificationStatus,
    pub attempts: i32,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<RarityOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClassificationJob {
    pub user_id: String,
    pub taxon_id: i64,
    pub taxon_name: Option<String>,
    pub priority: i64,
}

/// What `enqueue` did with a taxon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// A pending, processing or failed job already tracks the taxon.
    AlreadyTracked(ClassificationStatus),
    /// The taxon was classified earlier; its result can be applied directly.
    Classified(RarityOutcome),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
    pub percent_complete: i64,
}

impl QueueStatus {
    pub fn from_counts(pending: i64, processing: i64, completed: i64, failed: i64) -> Self {
        let total = pending + processing + completed + failed;
        let percent_complete = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).round() as i64
        } else {
            100
        };
        Self {
            pending,
            processing,
            completed,
            failed,
            total,
            percent_complete,
        }
    }
}

/// Queue status plus the count of stored observations still awaiting rarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCompletion {
    #[serde(flatten)]
    pub status: QueueStatus,
    pub pending_records: i64,
    pub is_complete: bool,
}

impl QueueCompletion {
    pub fn new(status: QueueStatus, pending_records: i64) -> Self {
        Self {
            status,
            pending_records,
            is_complete: status.pending + status.processing + status.failed + pending_records == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: String,
    pub taxon_id: i64,
    pub status: ClassificationStatus,
    pub rarity: Option<Rarity>,
    pub points_delta: i64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub success: bool,
    pub processed: usize,
    pub results: Vec<JobResult>,
}

#[derive(Debug, Clone)]
pub struct ClassificationConfig {
    pub default_batch_size: usize,
    pub max_batch_size: usize,
    pub max_attempts: i32,
    pub job_delay: Duration,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            default_batch_size: DEFAULT_BATCH_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
            max_attempts: MAX_ATTEMPTS,
            job_delay: Duration::from_millis(JOB_DELAY_MS),
        }
    }
}

impl ClassificationConfig {
    /// Applies the default and the hard ceiling to a caller-supplied size.
    pub fn resolve_batch_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_batch_size.min(self.max_batch_size)),
            Some(0) => Err(Error::validation("batchSize must be at least 1")),
            Some(size) => Ok(size.min(self.max_batch_size)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_complete_rounds_and_defaults_to_full() {
        assert_eq!(QueueStatus::from_counts(0, 0, 0, 0).percent_complete, 100);
        assert_eq!(QueueStatus::from_counts(2, 0, 1, 0).percent_complete, 33);
        assert_eq!(QueueStatus::from_counts(1, 0, 2, 0).percent_complete, 67);
    }

    #[test]
    fn completion_requires_no_pending_records() {
        let status = QueueStatus::from_counts(0, 0, 4, 0);
        assert!(QueueCompletion::new(status, 0).is_complete);
        assert!(!QueueCompletion::new(status, 3).is_complete);
        let failed = QueueStatus::from_counts(0, 0, 4, 1);
        assert!(!QueueCompletion::new(failed, 0).is_complete);
    }

    #[test]
    fn batch_size_is_clamped_to_ceiling() {
        let config = ClassificationConfig::default();
        assert_eq!(config.resolve_batch_size(None).unwrap(), 20);
        assert_eq!(config.resolve_batch_size(Some(500)).unwrap(), 50);
        assert_eq!(config.resolve_batch_size(Some(5)).unwrap(), 5);
        assert!(config.resolve_batch_size(Some(0)).is_err());
    }
}
