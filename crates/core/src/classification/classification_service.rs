use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::{
    ClassificationConfig, ClassificationJob, ClassificationQueueTrait,
    ClassificationRepositoryTrait, ClassificationStatus, EnqueueOutcome, JobResult,
    NewClassificationJob, ProcessOutcome, QueueCompletion, QueueStatus, RarityClassifier,
};
use crate::errors::{Error, Result};
use crate::gamification::RarityOutcome;
use crate::observations::ObservationRepositoryTrait;

pub struct ClassificationQueueService {
    repository: Arc<dyn ClassificationRepositoryTrait>,
    observation_repository: Arc<dyn ObservationRepositoryTrait>,
    classifier: Arc<dyn RarityClassifier>,
    config: ClassificationConfig,
}

impl ClassificationQueueService {
    pub fn new(
        repository: Arc<dyn ClassificationRepositoryTrait>,
        observation_repository: Arc<dyn ObservationRepositoryTrait>,
        classifier: Arc<dyn RarityClassifier>,
    ) -> Self {
        Self {
            repository,
            observation_repository,
            classifier,
            config: ClassificationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ClassificationConfig) -> Self {
        self.config = config;
        self
    }

    async fn classify_one(&self, job: &ClassificationJob) -> JobResult {
        let failure = match self.classifier.classify(job).await {
            Ok(outcome) => match self.repository.complete(&job.id, outcome).await {
                Ok(points_delta) => {
                    debug!(
                        "[RarityQueue] Taxon {} classified as {:?} ({:+} points)",
                        job.taxon_id, outcome.rarity, points_delta
                    );
                    return JobResult {
                        job_id: job.id.clone(),
                        taxon_id: job.taxon_id,
                        status: ClassificationStatus::Completed,
                        rarity: Some(outcome.rarity),
                        points_delta,
                        error: None,
                    };
                }
                Err(err) => err,
            },
            Err(err) => err,
        };

        warn!(
            "[RarityQueue] Taxon {} attempt {} failed: {}",
            job.taxon_id,
            job.attempts + 1,
            failure
        );
        let status = match self.fail(&job.id, &failure).await {
            Ok(status) => status,
            Err(err) => {
                // The job stays processing; startup recovery picks it up.
                error!(
                    "[RarityQueue] Could not record failure for job {}: {}",
                    job.id, err
                );
                ClassificationStatus::Processing
            }
        };
        JobResult {
            job_id: job.id.clone(),
            taxon_id: job.taxon_id,
            status,
            rarity: None,
            points_delta: 0,
            error: Some(failure.to_string()),
        }
    }
}

#[async_trait]
impl ClassificationQueueTrait for ClassificationQueueService {
    async fn enqueue(&self, job: NewClassificationJob) -> Result<EnqueueOutcome> {
        if job.user_id.trim().is_empty() {
            return Err(Error::validation("user id is required"));
        }
        self.repository.enqueue(job).await
    }

    async fn claim_batch(
        &self,
        user_id: Option<&str>,
        max_size: Option<usize>,
    ) -> Result<Vec<ClassificationJob>> {
        let size = self.config.resolve_batch_size(max_size)?;
        self.repository
            .claim_batch(user_id.map(str::to_string), size, self.config.max_attempts)
            .await
    }

    async fn complete(&self, job_id: &str, outcome: RarityOutcome) -> Result<i64> {
        self.repository.complete(job_id, outcome).await
    }

    async fn fail(&self, job_id: &str, error: &Error) -> Result<ClassificationStatus> {
        let transient = match error {
            Error::Classification { transient, .. } => *transient,
            Error::Source(source) => source.is_transient(),
            other => other.is_retryable(),
        };
        self.repository
            .fail(
                job_id,
                error.to_string(),
                transient,
                self.config.max_attempts,
            )
            .await
    }

    async fn reset_stale_processing_items(&self) -> Result<usize> {
        let recovered = self.repository.reset_stale_processing().await?;
        if recovered > 0 {
            info!(
                "[RarityQueue] Recovered {} stale processing job(s) to pending",
                recovered
            );
        }
        Ok(recovered)
    }

    fn status(&self, user_id: &str) -> Result<QueueStatus> {
        self.repository.status_counts(user_id)
    }

    fn completion(&self, user_id: &str) -> Result<QueueCompletion> {
        let status = self.repository.status_counts(user_id)?;
        let pending_records = self.observation_repository.count_pending_rarity(user_id)?;
        Ok(QueueCompletion::new(status, pending_records))
    }

    async fn process_batch(
        &self,
        user_id: Option<&str>,
        batch_size: Option<usize>,
    ) -> Result<ProcessOutcome> {
        let jobs = self.claim_batch(user_id, batch_size).await?;
        if jobs.is_empty() {
            return Ok(ProcessOutcome {
                success: true,
                processed: 0,
                results: Vec::new(),
            });
        }
        info!("[RarityQueue] Processing batch of {} job(s)", jobs.len());

        let mut results = Vec::with_capacity(jobs.len());
        for (index, job) in jobs.iter().enumerate() {
            if index > 0 && !self.config.job_delay.is_zero() {
                tokio::time::sleep(self.config.job_delay).await;
            }
            results.push(self.classify_one(job).await);
        }

        let completed = results
            .iter()
            .filter(|r| r.status == ClassificationStatus::Completed)
            .count();
        info!(
            "[RarityQueue] Batch done: {} completed, {} not completed",
            completed,
            results.len() - completed
        );

        Ok(ProcessOutcome {
            success: true,
            processed: results.len(),
            results,
        })
    }

    async fn clear_completed(&self, user_id: &str) -> Result<usize> {
        self.repository.clear_completed(user_id).await
    }

    async fn retry_failed(&self, user_id: &str) -> Result<usize> {
        self.repository.retry_failed(user_id).await
    }
}
