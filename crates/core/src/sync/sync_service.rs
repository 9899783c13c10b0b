use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::{
    SyncConfig, SyncCursor, SyncDelta, SyncLocks, SyncPhase, SyncProgress, SyncProgressTracker,
    SyncResult, SyncServiceTrait, SyncStateRepositoryTrait,
};
use crate::achievements::{AchievementReconcilerTrait, ReconcileOutcome};
use crate::classification::{ClassificationQueueTrait, EnqueueOutcome, NewClassificationJob};
use crate::clock::Clock;
use crate::errors::{Error, Result};
use crate::observations::{
    Observation, ObservationRepositoryTrait, ObservationSource, PageRequest, SourceCredentials,
};
use crate::reconciliation::ReconciliationServiceTrait;

/// What the page loop collected before the post-fetch steps run.
#[derive(Default)]
struct FetchState {
    delta: SyncDelta,
    fetched: u64,
    total_available: u64,
    skipped: usize,
    /// taxon id -> (name, observations seen this run)
    taxa: HashMap<i64, (Option<String>, i64)>,
}

impl FetchState {
    fn track(&mut self, observation: &Observation) {
        let newest = self.delta.newest_observation_date.get_or_insert(observation.updated_at);
        if observation.updated_at > *newest {
            *newest = observation.updated_at;
        }
        if let Some(taxon) = &observation.taxon {
            let entry = self
                .taxa
                .entry(taxon.id)
                .or_insert_with(|| (Some(taxon.name.clone()), 0));
            entry.1 += 1;
        }
    }
}

/// Drives one incremental sync run per call and everything it triggers.
pub struct SyncOrchestrator {
    source: Arc<dyn ObservationSource>,
    observation_repository: Arc<dyn ObservationRepositoryTrait>,
    sync_state_repository: Arc<dyn SyncStateRepositoryTrait>,
    classification_queue: Arc<dyn ClassificationQueueTrait>,
    reconciliation: Arc<dyn ReconciliationServiceTrait>,
    achievements: Arc<dyn AchievementReconcilerTrait>,
    clock: Arc<dyn Clock>,
    locks: SyncLocks,
    progress: Arc<SyncProgressTracker>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ObservationSource>,
        observation_repository: Arc<dyn ObservationRepositoryTrait>,
        sync_state_repository: Arc<dyn SyncStateRepositoryTrait>,
        classification_queue: Arc<dyn ClassificationQueueTrait>,
        reconciliation: Arc<dyn ReconciliationServiceTrait>,
        achievements: Arc<dyn AchievementReconcilerTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let progress = Arc::new(SyncProgressTracker::new(clock.clone()));
        Self {
            source,
            observation_repository,
            sync_state_repository,
            classification_queue,
            reconciliation,
            achievements,
            clock,
            locks: SyncLocks::new(),
            progress,
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_locks(mut self, locks: SyncLocks) -> Self {
        self.locks = locks;
        self
    }

    async fn fetch_pages(
        &self,
        user_id: &str,
        external_username: &str,
        credentials: &SourceCredentials,
        updated_since: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<FetchState> {
        let mut state = FetchState::default();
        let mut page = 1;

        loop {
            if page > 1 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }

            let request = PageRequest {
                username: external_username.to_string(),
                page,
                per_page: self.config.page_size,
                updated_since,
            };
            let response = self
                .source
                .fetch_observations(credentials, &request)
                .await
                .map_err(|e| Error::sync(format!("fetching page {} failed: {}", page, e)))?;

            let count = response.results.len();
            state.fetched += count as u64;
            state.total_available = response.total_results;
            let fetched = state.fetched;
            self.progress.update(user_id, |p| {
                p.observations_fetched = fetched;
                p.total_available = Some(response.total_results);
                p.message = format!("Fetched {} of {} observations", fetched, response.total_results);
            });

            let mut parsed = Vec::with_capacity(count);
            for raw in response.results {
                match Observation::from_raw(user_id, raw) {
                    Ok(observation) => {
                        state.track(&observation);
                        parsed.push(observation);
                    }
                    Err(err) => {
                        state.skipped += 1;
                        debug!("[Sync] Skipping record on page {}: {}", page, err);
                    }
                }
            }

            if !parsed.is_empty() {
                self.progress
                    .set_phase(user_id, SyncPhase::Storing, "Storing observations...");
                let stored = parsed.len() as u64;
                let summary = self
                    .observation_repository
                    .upsert_observations(user_id, parsed)
                    .await
                    .map_err(|e| Error::sync(format!("storing page {} failed: {}", page, e)))?;
                state.delta.updated_observations += summary.updated;
                state.delta.points_awarded += summary.inserted_points;
                state.delta.new_observation_ids.extend(summary.inserted_ids);
                self.progress.update(user_id, |p| {
                    p.phase = SyncPhase::Fetching;
                    p.observations_stored += stored;
                });
            }

            let drained =
                count < self.config.page_size as usize || state.fetched >= state.total_available;
            if drained {
                state.delta.fetched_all = true;
                return Ok(state);
            }
            if state.fetched >= limit {
                info!(
                    "[Sync] Run limit of {} reached for {}; resuming next sync",
                    limit, user_id
                );
                return Ok(state);
            }
            page += 1;
        }
    }

    /// Queues every taxon seen in the run. Taxa classified earlier are
    /// applied to the new records right away.
    async fn enqueue_taxa(&self, user_id: &str, state: &mut FetchState) -> Result<usize> {
        let mut queued = 0;
        let mut taxa: Vec<(i64, (Option<String>, i64))> = state.taxa.drain().collect();
        taxa.sort_by_key(|(taxon_id, _)| *taxon_id);

        for (taxon_id, (taxon_name, seen)) in taxa {
            let outcome = self
                .classification_queue
                .enqueue(NewClassificationJob {
                    user_id: user_id.to_string(),
                    taxon_id,
                    taxon_name,
                    priority: seen,
                })
                .await?;
            match outcome {
                EnqueueOutcome::Queued => queued += 1,
                EnqueueOutcome::Classified(rarity) => {
                    let points = self
                        .observation_repository
                        .apply_rarity(user_id, taxon_id, rarity)
                        .await?;
                    state.delta.points_awarded += points;
                }
                EnqueueOutcome::AlreadyTracked(_) => {}
            }
        }
        Ok(queued)
    }

    async fn run(
        &self,
        user_id: &str,
        external_username: &str,
        credentials: &SourceCredentials,
    ) -> Result<SyncResult> {
        let cursor = self.sync_state_repository.get_cursor(user_id)?;
        let updated_since = cursor.updated_since();
        let limit = if self.observation_repository.count_for_user(user_id)? == 0 {
            self.config.first_sync_limit
        } else {
            self.config.max_observations_per_run
        };
        info!(
            "[Sync] Starting sync for {} (since {:?}, limit {})",
            user_id, updated_since, limit
        );

        let mut state = self
            .fetch_pages(user_id, external_username, credentials, updated_since, limit)
            .await?;

        self.progress
            .set_phase(user_id, SyncPhase::Calculating, "Calculating rewards...");
        let queued_taxa = self.enqueue_taxa(user_id, &mut state).await?;

        let next_cursor: SyncCursor = cursor.after_run(
            state.delta.fetched_all,
            state.delta.newest_observation_date,
            self.clock.now(),
        );
        self.sync_state_repository
            .save_cursor(user_id, next_cursor)
            .await?;

        if state.delta.fetched_all && updated_since.is_none() {
            let local = self.observation_repository.count_for_user(user_id)?;
            if (local as u64) > state.total_available {
                if let Err(err) = self
                    .reconciliation
                    .queue(user_id, external_username)
                    .await
                {
                    warn!(
                        "[Sync] Could not queue deletion check for {}: {}",
                        user_id, err
                    );
                }
            }
        }

        let achievements = match self.achievements.reconcile(user_id, &state.delta).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("[Sync] Achievement update failed for {}: {}", user_id, err);
                ReconcileOutcome::default()
            }
        };

        let result = SyncResult {
            new_observations: state.delta.new_observation_ids.len(),
            new_badges: achievements.new_badges,
            completed_quests: achievements.completed_quests,
            leveled_up: achievements.leveled_up,
            fetched_all: state.delta.fetched_all,
            total_available: state.total_available,
            skipped_records: state.skipped,
            queued_taxa,
        };
        info!(
            "[Sync] Finished for {}: {} new, {} updated, {} skipped, fetched_all={}",
            user_id,
            result.new_observations,
            state.delta.updated_observations,
            result.skipped_records,
            result.fetched_all
        );
        Ok(result)
    }
}

#[async_trait]
impl SyncServiceTrait for SyncOrchestrator {
    async fn sync(
        &self,
        user_id: &str,
        external_username: &str,
        credentials: &SourceCredentials,
    ) -> Result<SyncResult> {
        if user_id.trim().is_empty() {
            return Err(Error::validation("user id is required"));
        }
        if external_username.trim().is_empty() {
            return Err(Error::validation("external username is required"));
        }

        let _guard = self.locks.try_acquire(user_id)?;
        self.progress.start(user_id);

        match self.run(user_id, external_username, credentials).await {
            Ok(result) => {
                self.progress.set_phase(
                    user_id,
                    SyncPhase::Done,
                    format!("Synced {} new observations", result.new_observations),
                );
                Ok(result)
            }
            Err(err) => {
                warn!("[Sync] Sync failed for {}: {}", user_id, err);
                self.progress
                    .set_phase(user_id, SyncPhase::Error, err.to_string());
                Err(err)
            }
        }
    }

    fn progress(&self, user_id: &str) -> Option<SyncProgress> {
        self.progress.get(user_id)
    }
}
