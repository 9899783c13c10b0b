use async_trait::async_trait;
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::{ReconciliationOutcome, ReconciliationRepositoryTrait};
use crate::errors::{Error, Result};
use crate::observations::{
    ObservationRepositoryTrait, ObservationSource, PageRequest, SourceCredentials,
};
use crate::sync::SyncConfig;

#[async_trait]
pub trait ReconciliationServiceTrait: Send + Sync {
    async fn queue(&self, user_id: &str, external_username: &str) -> Result<()>;

    /// Processes at most one pending unit for the user.
    async fn process_next(
        &self,
        user_id: &str,
        credentials: &SourceCredentials,
    ) -> Result<ReconciliationOutcome>;
}

pub struct DeletionReconciler {
    repository: Arc<dyn ReconciliationRepositoryTrait>,
    observation_repository: Arc<dyn ObservationRepositoryTrait>,
    source: Arc<dyn ObservationSource>,
    page_size: u32,
    page_delay: Duration,
}

impl DeletionReconciler {
    pub fn new(
        repository: Arc<dyn ReconciliationRepositoryTrait>,
        observation_repository: Arc<dyn ObservationRepositoryTrait>,
        source: Arc<dyn ObservationSource>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            repository,
            observation_repository,
            source,
            page_size: config.page_size,
            page_delay: config.page_delay,
        }
    }

    async fn remote_ids(
        &self,
        username: &str,
        credentials: &SourceCredentials,
    ) -> Result<HashSet<i64>> {
        let mut ids = HashSet::new();
        let mut page = 1;
        let mut seen: u64 = 0;
        loop {
            let request = PageRequest {
                username: username.to_string(),
                page,
                per_page: self.page_size,
                updated_since: None,
            };
            let response = self
                .source
                .fetch_observations(credentials, &request)
                .await
                .map_err(|e| Error::sync(format!("listing page {} failed: {}", page, e)))?;
            let count = response.results.len();
            seen += count as u64;
            ids.extend(response.results.iter().filter_map(|r| r.id));
            if count < self.page_size as usize || seen >= response.total_results {
                return Ok(ids);
            }
            page += 1;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }
    }
}

#[async_trait]
impl ReconciliationServiceTrait for DeletionReconciler {
    async fn queue(&self, user_id: &str, external_username: &str) -> Result<()> {
        self.repository.queue(user_id, external_username).await
    }

    async fn process_next(
        &self,
        user_id: &str,
        credentials: &SourceCredentials,
    ) -> Result<ReconciliationOutcome> {
        let Some(job) = self.repository.next_pending(user_id)? else {
            return Ok(ReconciliationOutcome::default());
        };

        let remote = match self.remote_ids(&job.external_username, credentials).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!("[Reconcile] Deletion check for {} failed: {}", user_id, err);
                self.repository
                    .mark_failed(user_id, err.to_string())
                    .await?;
                return Err(err);
            }
        };

        let stale: Vec<i64> = self
            .observation_repository
            .list_ids(user_id)?
            .into_iter()
            .filter(|id| !remote.contains(id))
            .collect();
        let deleted = if stale.is_empty() {
            0
        } else {
            self.observation_repository
                .delete_observations(user_id, stale)
                .await?
        };
        self.repository.mark_completed(user_id, deleted).await?;
        info!(
            "[Reconcile] Removed {} observation(s) deleted at the source for {}",
            deleted, user_id
        );

        Ok(ReconciliationOutcome {
            processed: true,
            deleted,
        })
    }
}
