//! In-memory repository and source doubles for service tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::achievements::{
    AchievementRepositoryTrait, LeaderboardPeriod, QuestAssignment, UserStats,
};
use crate::classification::{
    ClassificationJob, ClassificationRepositoryTrait, ClassificationStatus, EnqueueOutcome,
    NewClassificationJob, QueueStatus,
};
use crate::errors::{Error, Result, SourceError};
use crate::gamification::RarityOutcome;
use crate::observations::{
    Coordinates, Observation, ObservationFacts, ObservationPage, ObservationRepositoryTrait,
    ObservationSource, PageRequest, RarityStatus, RawObservation, RawTaxon, SourceCredentials,
    UpsertSummary,
};
use crate::reconciliation::{
    ReconciliationJob, ReconciliationRepositoryTrait, ReconciliationStatus,
};
use crate::sync::{SyncCursor, SyncStateRepositoryTrait};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Research-grade record with one photo, observed 2026-07-01.
pub fn raw_observation(id: i64, taxon_id: Option<i64>) -> RawObservation {
    RawObservation {
        id: Some(id),
        species_guess: Some(format!("species {id}")),
        taxon: taxon_id.map(|taxon| RawTaxon {
            id: Some(taxon),
            name: Some(format!("Taxon {taxon}")),
            preferred_common_name: None,
            rank: Some("species".to_string()),
            iconic_taxon_name: Some("Aves".to_string()),
        }),
        observed_on: Some("2026-07-01".to_string()),
        updated_at: Some("2026-07-01T10:00:00Z".to_string()),
        quality_grade: Some("research".to_string()),
        photos: vec![serde_json::json!({ "id": id })],
        location: Some("45.52,-122.68".to_string()),
        place_guess: Some("Portland, OR".to_string()),
        place_ids: Vec::new(),
    }
}

#[derive(Default)]
pub struct InMemoryObservationRepository {
    rows: Mutex<HashMap<String, BTreeMap<i64, Observation>>>,
}

impl InMemoryObservationRepository {
    pub fn get(&self, user_id: &str, id: i64) -> Option<Observation> {
        lock(&self.rows).get(user_id).and_then(|m| m.get(&id).cloned())
    }
}

#[async_trait]
impl ObservationRepositoryTrait for InMemoryObservationRepository {
    async fn upsert_observations(
        &self,
        user_id: &str,
        observations: Vec<Observation>,
    ) -> Result<UpsertSummary> {
        let mut rows = lock(&self.rows);
        let stored = rows.entry(user_id.to_string()).or_default();
        let mut summary = UpsertSummary::default();
        for mut observation in observations {
            match stored.get(&observation.id) {
                Some(existing) => {
                    observation.inherit_rarity(existing);
                    summary.updated += 1;
                }
                None => {
                    summary.inserted_ids.push(observation.id);
                    summary.inserted_points += observation.points_awarded;
                }
            }
            stored.insert(observation.id, observation);
        }
        Ok(summary)
    }

    async fn apply_rarity(
        &self,
        user_id: &str,
        taxon_id: i64,
        outcome: RarityOutcome,
    ) -> Result<i64> {
        let mut rows = lock(&self.rows);
        let mut delta = 0;
        if let Some(stored) = rows.get_mut(user_id) {
            for observation in stored.values_mut().filter(|o| {
                o.rarity_status == RarityStatus::Pending && o.taxon_id() == Some(taxon_id)
            }) {
                let before = observation.points_awarded;
                observation.apply_rarity(&outcome);
                delta += observation.points_awarded - before;
            }
        }
        Ok(delta)
    }

    async fn delete_observations(&self, user_id: &str, ids: Vec<i64>) -> Result<usize> {
        let mut rows = lock(&self.rows);
        let Some(stored) = rows.get_mut(user_id) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| stored.remove(id).is_some()).count())
    }

    fn count_for_user(&self, user_id: &str) -> Result<i64> {
        Ok(lock(&self.rows).get(user_id).map_or(0, |m| m.len() as i64))
    }

    fn count_pending_rarity(&self, user_id: &str) -> Result<i64> {
        Ok(lock(&self.rows).get(user_id).map_or(0, |m| {
            m.values()
                .filter(|o| o.rarity_status == RarityStatus::Pending)
                .count() as i64
        }))
    }

    fn list_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        Ok(lock(&self.rows)
            .get(user_id)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default())
    }

    fn facts(&self, user_id: &str, since: Option<DateTime<Utc>>) -> Result<ObservationFacts> {
        let rows = lock(&self.rows);
        let since = since.map(|s| s.date_naive());
        let Some(stored) = rows.get(user_id) else {
            return Ok(ObservationFacts::default());
        };
        Ok(ObservationFacts::from_observations(stored.values().filter(
            |o| match since {
                Some(day) => o.observed_on.is_some_and(|d| d >= day),
                None => true,
            },
        )))
    }

    fn latest_coordinates(&self, user_id: &str) -> Result<Option<Coordinates>> {
        Ok(lock(&self.rows).get(user_id).and_then(|m| {
            m.values()
                .filter(|o| o.coordinates.is_some())
                .max_by_key(|o| (o.observed_on, o.updated_at))
                .and_then(|o| o.coordinates)
        }))
    }
}

#[derive(Default)]
pub struct InMemorySyncStateRepository {
    cursors: Mutex<HashMap<String, SyncCursor>>,
}

#[async_trait]
impl SyncStateRepositoryTrait for InMemorySyncStateRepository {
    fn get_cursor(&self, user_id: &str) -> Result<SyncCursor> {
        Ok(lock(&self.cursors)
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_cursor(&self, user_id: &str, cursor: SyncCursor) -> Result<()> {
        lock(&self.cursors).insert(user_id.to_string(), cursor);
        Ok(())
    }
}

/// Job table kept in insertion order so equal timestamps claim FIFO.
#[derive(Default)]
pub struct InMemoryClassificationRepository {
    jobs: Mutex<Vec<ClassificationJob>>,
}

impl InMemoryClassificationRepository {
    pub fn jobs(&self) -> Vec<ClassificationJob> {
        lock(&self.jobs).clone()
    }
}

#[async_trait]
impl ClassificationRepositoryTrait for InMemoryClassificationRepository {
    async fn enqueue(&self, job: NewClassificationJob) -> Result<EnqueueOutcome> {
        let mut jobs = lock(&self.jobs);
        if let Some(existing) = jobs
            .iter()
            .find(|j| j.user_id == job.user_id && j.taxon_id == job.taxon_id)
        {
            return Ok(match (existing.status, existing.result) {
                (ClassificationStatus::Completed, Some(result)) => {
                    EnqueueOutcome::Classified(result)
                }
                (status, _) => EnqueueOutcome::AlreadyTracked(status),
            });
        }
        jobs.push(ClassificationJob {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: job.user_id,
            taxon_id: job.taxon_id,
            taxon_name: job.taxon_name,
            priority: job.priority,
            status: ClassificationStatus::Pending,
            attempts: 0,
            enqueued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            result: None,
        });
        Ok(EnqueueOutcome::Queued)
    }

    async fn claim_batch(
        &self,
        user_id: Option<String>,
        max_size: usize,
        max_attempts: i32,
    ) -> Result<Vec<ClassificationJob>> {
        let mut jobs = lock(&self.jobs);
        let mut candidates: Vec<usize> = jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| {
                j.status == ClassificationStatus::Pending
                    && j.attempts < max_attempts
                    && user_id.as_deref().map_or(true, |u| j.user_id == u)
            })
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by(|a, b| {
            jobs[*b]
                .priority
                .cmp(&jobs[*a].priority)
                .then(jobs[*a].enqueued_at.cmp(&jobs[*b].enqueued_at))
        });
        let now = Utc::now();
        Ok(candidates
            .into_iter()
            .take(max_size)
            .map(|i| {
                jobs[i].status = ClassificationStatus::Processing;
                jobs[i].started_at = Some(now);
                jobs[i].clone()
            })
            .collect())
    }

    async fn complete(&self, job_id: &str, outcome: RarityOutcome) -> Result<i64> {
        let mut jobs = lock(&self.jobs);
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::not_found(format!("classification job {job_id}")))?;
        job.status = ClassificationStatus::Completed;
        job.completed_at = Some(Utc::now());
        job.result = Some(outcome);
        job.last_error = None;
        Ok(0)
    }

    async fn fail(
        &self,
        job_id: &str,
        error: String,
        transient: bool,
        max_attempts: i32,
    ) -> Result<ClassificationStatus> {
        let mut jobs = lock(&self.jobs);
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::not_found(format!("classification job {job_id}")))?;
        job.attempts += 1;
        job.last_error = Some(error);
        job.status = if transient && job.attempts < max_attempts {
            ClassificationStatus::Pending
        } else {
            job.completed_at = Some(Utc::now());
            ClassificationStatus::Failed
        };
        Ok(job.status)
    }

    async fn reset_stale_processing(&self) -> Result<usize> {
        let mut jobs = lock(&self.jobs);
        let mut reset = 0;
        for job in jobs
            .iter_mut()
            .filter(|j| j.status == ClassificationStatus::Processing)
        {
            job.status = ClassificationStatus::Pending;
            job.started_at = None;
            reset += 1;
        }
        Ok(reset)
    }

    fn status_counts(&self, user_id: &str) -> Result<QueueStatus> {
        let jobs = lock(&self.jobs);
        let count = |status: ClassificationStatus| {
            jobs.iter()
                .filter(|j| j.user_id == user_id && j.status == status)
                .count() as i64
        };
        Ok(QueueStatus::from_counts(
            count(ClassificationStatus::Pending),
            count(ClassificationStatus::Processing),
            count(ClassificationStatus::Completed),
            count(ClassificationStatus::Failed),
        ))
    }

    fn get_job(&self, job_id: &str) -> Result<Option<ClassificationJob>> {
        Ok(lock(&self.jobs).iter().find(|j| j.id == job_id).cloned())
    }

    async fn clear_completed(&self, user_id: &str) -> Result<usize> {
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|j| !(j.user_id == user_id && j.status == ClassificationStatus::Completed));
        Ok(before - jobs.len())
    }

    async fn retry_failed(&self, user_id: &str) -> Result<usize> {
        let mut jobs = lock(&self.jobs);
        let mut retried = 0;
        for job in jobs
            .iter_mut()
            .filter(|j| j.user_id == user_id && j.status == ClassificationStatus::Failed)
        {
            job.status = ClassificationStatus::Pending;
            job.attempts = 0;
            job.completed_at = None;
            retried += 1;
        }
        Ok(retried)
    }
}

#[derive(Default)]
pub struct InMemoryAchievementRepository {
    stats: Mutex<HashMap<String, UserStats>>,
    badges: Mutex<HashMap<String, HashSet<String>>>,
    quests: Mutex<HashMap<String, Vec<QuestAssignment>>>,
}

#[async_trait]
impl AchievementRepositoryTrait for InMemoryAchievementRepository {
    fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        Ok(lock(&self.stats).get(user_id).cloned())
    }

    async fn save_user_stats(&self, mut stats: UserStats) -> Result<()> {
        let mut all = lock(&self.stats);
        if let Some(existing) = all.get(&stats.user_id) {
            stats.weekly_points = existing.weekly_points;
            stats.monthly_points = existing.monthly_points;
            stats.week_start = existing.week_start;
            stats.month_start = existing.month_start;
        }
        all.insert(stats.user_id.clone(), stats);
        Ok(())
    }

    async fn roll_leaderboard_period(
        &self,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
    ) -> Result<usize> {
        let mut stats = lock(&self.stats);
        let mut rolled = 0;
        for entry in stats.values_mut() {
            let (anchor, points) = match period {
                LeaderboardPeriod::Weekly => (&mut entry.week_start, &mut entry.weekly_points),
                LeaderboardPeriod::Monthly => (&mut entry.month_start, &mut entry.monthly_points),
            };
            if anchor.map_or(true, |a| a < period_start) {
                *anchor = Some(period_start);
                *points = 0;
                rolled += 1;
            }
        }
        Ok(rolled)
    }

    fn list_badges(&self, user_id: &str) -> Result<HashSet<String>> {
        Ok(lock(&self.badges).get(user_id).cloned().unwrap_or_default())
    }

    async fn unlock_badges(
        &self,
        user_id: &str,
        codes: Vec<String>,
        _unlocked_at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut badges = lock(&self.badges);
        let owned = badges.entry(user_id.to_string()).or_default();
        Ok(codes.into_iter().filter(|c| owned.insert(c.clone())).collect())
    }

    fn list_quests(&self, user_id: &str) -> Result<Vec<QuestAssignment>> {
        Ok(lock(&self.quests).get(user_id).cloned().unwrap_or_default())
    }

    async fn upsert_quests(&self, user_id: &str, quests: Vec<QuestAssignment>) -> Result<()> {
        let mut all = lock(&self.quests);
        let stored = all.entry(user_id.to_string()).or_default();
        for quest in quests {
            match stored
                .iter_mut()
                .find(|q| q.quest_code == quest.quest_code && q.period_start == quest.period_start)
            {
                Some(existing) => *existing = quest,
                None => stored.push(quest),
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryReconciliationRepository {
    jobs: Mutex<HashMap<String, ReconciliationJob>>,
}

impl InMemoryReconciliationRepository {
    pub fn job(&self, user_id: &str) -> Option<ReconciliationJob> {
        lock(&self.jobs).get(user_id).cloned()
    }
}

#[async_trait]
impl ReconciliationRepositoryTrait for InMemoryReconciliationRepository {
    async fn queue(&self, user_id: &str, external_username: &str) -> Result<()> {
        lock(&self.jobs).insert(
            user_id.to_string(),
            ReconciliationJob {
                user_id: user_id.to_string(),
                external_username: external_username.to_string(),
                status: ReconciliationStatus::Pending,
                queued_at: Utc::now(),
                processed_at: None,
                deleted_count: 0,
                last_error: None,
            },
        );
        Ok(())
    }

    fn next_pending(&self, user_id: &str) -> Result<Option<ReconciliationJob>> {
        Ok(lock(&self.jobs)
            .get(user_id)
            .filter(|j| j.status == ReconciliationStatus::Pending)
            .cloned())
    }

    async fn mark_completed(&self, user_id: &str, deleted: usize) -> Result<()> {
        if let Some(job) = lock(&self.jobs).get_mut(user_id) {
            job.status = ReconciliationStatus::Completed;
            job.processed_at = Some(Utc::now());
            job.deleted_count = deleted as i64;
        }
        Ok(())
    }

    async fn mark_failed(&self, user_id: &str, error: String) -> Result<()> {
        if let Some(job) = lock(&self.jobs).get_mut(user_id) {
            job.status = ReconciliationStatus::Failed;
            job.processed_at = Some(Utc::now());
            job.last_error = Some(error);
        }
        Ok(())
    }
}

/// Serves a fixed record set in `updated_at` order, one page per call.
#[derive(Default)]
pub struct FakeSource {
    records: Vec<RawObservation>,
    fail_on_page: Mutex<Option<u32>>,
    requests: Mutex<Vec<PageRequest>>,
    taxon_counts: HashMap<i64, u64>,
}

impl FakeSource {
    pub fn with_records(mut records: Vec<RawObservation>) -> Self {
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn with_taxon_count(mut self, taxon_id: i64, count: u64) -> Self {
        self.taxon_counts.insert(taxon_id, count);
        self
    }

    pub fn fail_on_page(&self, page: u32) {
        *lock(&self.fail_on_page) = Some(page);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ObservationSource for FakeSource {
    async fn fetch_observations(
        &self,
        _credentials: &SourceCredentials,
        request: &PageRequest,
    ) -> std::result::Result<ObservationPage, SourceError> {
        lock(&self.requests).push(request.clone());
        if *lock(&self.fail_on_page) == Some(request.page) {
            return Err(SourceError::api(503, "service unavailable"));
        }

        let matching: Vec<&RawObservation> = self
            .records
            .iter()
            .filter(|r| match (request.updated_since, r.updated_at.as_deref()) {
                (Some(since), Some(value)) => DateTime::parse_from_rfc3339(value)
                    .map(|ts| ts.with_timezone(&Utc) >= since)
                    .unwrap_or(true),
                _ => true,
            })
            .collect();
        let per_page = request.per_page.max(1) as usize;
        let offset = (request.page.saturating_sub(1) as usize) * per_page;
        Ok(ObservationPage {
            total_results: matching.len() as u64,
            page: request.page,
            per_page: request.per_page,
            results: matching
                .into_iter()
                .skip(offset)
                .take(per_page)
                .cloned()
                .collect(),
        })
    }

    async fn taxon_observation_count(
        &self,
        taxon_id: i64,
        _place_id: Option<i64>,
    ) -> std::result::Result<u64, SourceError> {
        Ok(self
            .taxon_counts
            .get(&taxon_id)
            .copied()
            .unwrap_or(taxon_id as u64 * 100))
    }
}
