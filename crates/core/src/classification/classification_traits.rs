use async_trait::async_trait;

use super::{
    ClassificationJob, ClassificationStatus, EnqueueOutcome, NewClassificationJob,
    ProcessOutcome, QueueCompletion, QueueStatus,
};
use crate::errors::{Error, Result};
use crate::gamification::RarityOutcome;

#[async_trait]
pub trait ClassificationRepositoryTrait: Send + Sync {
    /// Inserts a pending job unless one already tracks `(user_id, taxon_id)`.
    async fn enqueue(&self, job: NewClassificationJob) -> Result<EnqueueOutcome>;

    /// Moves up to `max_size` claimable jobs to `processing` and returns them.
    /// Two concurrent claims never return the same job.
    async fn claim_batch(
        &self,
        user_id: Option<String>,
        max_size: usize,
        max_attempts: i32,
    ) -> Result<Vec<ClassificationJob>>;

    /// Settles a job as completed and applies the outcome to the user's
    /// pending observations and point totals in one transaction.
    /// Returns the change in the user's points.
    async fn complete(&self, job_id: &str, outcome: RarityOutcome) -> Result<i64>;

    /// Records a failed attempt. Transient failures under `max_attempts` go
    /// back to pending; everything else settles as failed.
    async fn fail(
        &self,
        job_id: &str,
        error: String,
        transient: bool,
        max_attempts: i32,
    ) -> Result<ClassificationStatus>;

    /// Reverts every job still `processing` to `pending`.
    async fn reset_stale_processing(&self) -> Result<usize>;

    fn status_counts(&self, user_id: &str) -> Result<QueueStatus>;

    fn get_job(&self, job_id: &str) -> Result<Option<ClassificationJob>>;

    async fn clear_completed(&self, user_id: &str) -> Result<usize>;

    async fn retry_failed(&self, user_id: &str) -> Result<usize>;
}

/// Determines the rarity of one taxon.
#[async_trait]
pub trait RarityClassifier: Send + Sync {
    async fn classify(&self, job: &ClassificationJob) -> Result<RarityOutcome>;
}

#[async_trait]
pub trait ClassificationQueueTrait: Send + Sync {
    async fn enqueue(&self, job: NewClassificationJob) -> Result<EnqueueOutcome>;

    /// `max_size` defaults to the configured batch size and is capped at the ceiling.
    async fn claim_batch(
        &self,
        user_id: Option<&str>,
        max_size: Option<usize>,
    ) -> Result<Vec<ClassificationJob>>;

    async fn complete(&self, job_id: &str, outcome: RarityOutcome) -> Result<i64>;

    async fn fail(&self, job_id: &str, error: &Error) -> Result<ClassificationStatus>;

    /// Startup recovery for jobs orphaned by a dead worker.
    async fn reset_stale_processing_items(&self) -> Result<usize>;

    fn status(&self, user_id: &str) -> Result<QueueStatus>;

    fn completion(&self, user_id: &str) -> Result<QueueCompletion>;

    /// Claims one batch and classifies each job independently.
    async fn process_batch(
        &self,
        user_id: Option<&str>,
        batch_size: Option<usize>,
    ) -> Result<ProcessOutcome>;

    async fn clear_completed(&self, user_id: &str) -> Result<usize>;

    async fn retry_failed(&self, user_id: &str) -> Result<usize>;
}
