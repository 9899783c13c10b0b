use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use super::*;
use crate::achievements::AchievementReconciler;
use crate::classification::{
    ClassificationConfig, ClassificationQueueService, ClassificationQueueTrait,
    SourceRarityClassifier,
};
use crate::clock::ManualClock;
use crate::errors::Error;
use crate::gamification::Rarity;
use crate::observations::{
    Observation, ObservationRepositoryTrait, RawObservation, SourceCredentials,
};
use crate::reconciliation::{DeletionReconciler, ReconciliationStatus};
use crate::test_support::{
    raw_observation, FakeSource, InMemoryAchievementRepository, InMemoryClassificationRepository,
    InMemoryObservationRepository, InMemoryReconciliationRepository, InMemorySyncStateRepository,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap()
}

fn config(page_size: u32) -> SyncConfig {
    SyncConfig {
        page_size,
        page_delay: std::time::Duration::ZERO,
        ..SyncConfig::default()
    }
}

/// Records 1..=n, one minute apart, spread over three taxa.
fn records(n: i64) -> Vec<RawObservation> {
    let base = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
    (1..=n)
        .map(|i| {
            let mut raw = raw_observation(i, Some(i % 3 + 1));
            raw.updated_at = Some((base + Duration::minutes(i)).to_rfc3339());
            raw
        })
        .collect()
}

struct Harness {
    observations: Arc<InMemoryObservationRepository>,
    cursors: Arc<InMemorySyncStateRepository>,
    queue: Arc<ClassificationQueueService>,
    reconciliations: Arc<InMemoryReconciliationRepository>,
    achievements: Arc<InMemoryAchievementRepository>,
    clock: Arc<ManualClock>,
    locks: SyncLocks,
}

impl Harness {
    fn new() -> Self {
        let observations = Arc::new(InMemoryObservationRepository::default());
        let queue = ClassificationQueueService::new(
            Arc::new(InMemoryClassificationRepository::default()),
            observations.clone(),
            Arc::new(SourceRarityClassifier::new(Arc::new(FakeSource::default()))),
        )
        .with_config(ClassificationConfig {
            job_delay: std::time::Duration::ZERO,
            ..ClassificationConfig::default()
        });
        Self {
            observations,
            cursors: Arc::new(InMemorySyncStateRepository::default()),
            queue: Arc::new(queue),
            reconciliations: Arc::new(InMemoryReconciliationRepository::default()),
            achievements: Arc::new(InMemoryAchievementRepository::default()),
            clock: Arc::new(ManualClock::new(now())),
            locks: SyncLocks::new(),
        }
    }

    fn orchestrator(&self, source: Arc<FakeSource>, config: SyncConfig) -> SyncOrchestrator {
        let reconciler = DeletionReconciler::new(
            self.reconciliations.clone(),
            self.observations.clone(),
            source.clone(),
            &config,
        );
        let achievements = AchievementReconciler::new(
            self.achievements.clone(),
            self.observations.clone(),
            self.clock.clone(),
        );
        SyncOrchestrator::new(
            source,
            self.observations.clone(),
            self.cursors.clone(),
            self.queue.clone(),
            Arc::new(reconciler),
            Arc::new(achievements),
            self.clock.clone(),
        )
        .with_config(config)
        .with_locks(self.locks.clone())
    }
}

#[test]
fn drained_run_clears_cursor_and_stamps_last_sync() {
    let previous = SyncCursor {
        sync_cursor: Some(now() - Duration::days(1)),
        has_more_to_sync: true,
        last_synced_at: Some(now() - Duration::days(3)),
    };
    let next = previous.after_run(true, Some(now() - Duration::hours(1)), now());
    assert_eq!(next.sync_cursor, None);
    assert!(!next.has_more_to_sync);
    assert_eq!(next.last_synced_at, Some(now()));
    assert_eq!(next.updated_since(), Some(now()));
}

#[test]
fn capped_run_keeps_last_sync_and_records_newest_seen() {
    let previous = SyncCursor {
        sync_cursor: None,
        has_more_to_sync: false,
        last_synced_at: Some(now() - Duration::days(3)),
    };
    let newest = now() - Duration::hours(2);
    let next = previous.after_run(false, Some(newest), now());
    assert_eq!(next.sync_cursor, Some(newest));
    assert!(next.has_more_to_sync);
    assert_eq!(next.last_synced_at, previous.last_synced_at);
    assert_eq!(next.updated_since(), Some(newest));
}

#[test]
fn capped_run_without_dated_records_drops_previous_cursor() {
    let previous = SyncCursor {
        sync_cursor: Some(now() - Duration::days(5)),
        has_more_to_sync: true,
        last_synced_at: None,
    };
    let next = previous.after_run(false, None, now());
    assert_eq!(next.sync_cursor, None);
    assert!(next.has_more_to_sync);
    assert_eq!(next.last_synced_at, None);
}

#[tokio::test]
async fn first_sync_pages_through_everything_and_queues_taxa() {
    let harness = Harness::new();
    let source = Arc::new(FakeSource::with_records(records(120)));
    let orchestrator = harness.orchestrator(source.clone(), config(50));

    let result = orchestrator
        .sync("u1", "naturalist", &SourceCredentials::bearer("token"))
        .await
        .expect("sync");

    assert_eq!(source.requests().len(), 3);
    assert!(source.requests().iter().all(|r| r.updated_since.is_none()));
    assert!(result.fetched_all);
    assert_eq!(result.new_observations, 120);
    assert_eq!(result.total_available, 120);
    assert_eq!(result.queued_taxa, 3);
    assert!(result.new_badges.contains(&"first_steps".to_string()));

    let cursor = harness.cursors.get_cursor("u1").expect("cursor");
    assert_eq!(cursor.sync_cursor, None);
    assert!(!cursor.has_more_to_sync);
    assert_eq!(cursor.last_synced_at, Some(now()));

    let status = harness.queue.status("u1").expect("status");
    assert_eq!(status.pending, 3);
    assert_eq!(harness.observations.count_pending_rarity("u1").unwrap(), 120);

    let progress = orchestrator.progress("u1").expect("progress");
    assert_eq!(progress.phase, SyncPhase::Done);
    assert_eq!(progress.observations_stored, 120);
}

#[tokio::test]
async fn capped_first_sync_resumes_from_newest_record() {
    let harness = Harness::new();
    let source = Arc::new(FakeSource::with_records(records(120)));
    let orchestrator = harness.orchestrator(
        source.clone(),
        SyncConfig {
            first_sync_limit: 100,
            ..config(50)
        },
    );

    let first = orchestrator
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await
        .expect("first sync");
    assert!(!first.fetched_all);
    assert_eq!(first.new_observations, 100);

    let cursor = harness.cursors.get_cursor("u1").expect("cursor");
    let hundredth = Utc.with_ymd_and_hms(2026, 7, 1, 1, 40, 0).unwrap();
    assert_eq!(cursor.sync_cursor, Some(hundredth));
    assert!(cursor.has_more_to_sync);
    assert_eq!(cursor.last_synced_at, None);

    let second = orchestrator
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await
        .expect("second sync");
    assert!(second.fetched_all);
    assert_eq!(second.new_observations, 20);
    assert_eq!(source.requests().last().unwrap().updated_since, Some(hundredth));
    assert_eq!(harness.observations.count_for_user("u1").unwrap(), 120);

    let cursor = harness.cursors.get_cursor("u1").expect("cursor");
    assert_eq!(cursor.sync_cursor, None);
    assert!(!cursor.has_more_to_sync);
}

#[tokio::test]
async fn mid_run_failure_leaves_cursor_untouched() {
    let harness = Harness::new();
    let saved = SyncCursor {
        sync_cursor: None,
        has_more_to_sync: false,
        last_synced_at: Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()),
    };
    harness
        .cursors
        .save_cursor("u1", saved.clone())
        .await
        .expect("seed cursor");

    let source = Arc::new(FakeSource::with_records(records(120)));
    source.fail_on_page(2);
    let orchestrator = harness.orchestrator(source, config(50));

    let result = orchestrator
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await;
    assert!(matches!(result, Err(Error::Sync(_))));

    assert_eq!(harness.cursors.get_cursor("u1").unwrap(), saved);
    assert_eq!(harness.observations.count_for_user("u1").unwrap(), 50);
    assert_eq!(
        orchestrator.progress("u1").map(|p| p.phase),
        Some(SyncPhase::Error)
    );
    assert!(!harness.locks.is_running("u1"));
}

#[tokio::test]
async fn concurrent_sync_for_same_user_is_rejected() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(FakeSource::default()), config(50));
    let _running = harness.locks.try_acquire("u1").expect("lock");

    let result = orchestrator
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await;
    assert!(matches!(result, Err(Error::SyncInFlight(user)) if user == "u1"));

    let other = orchestrator
        .sync("u2", "someone-else", &SourceCredentials::default())
        .await;
    assert!(other.is_ok());
}

#[tokio::test]
async fn blank_identity_is_a_validation_error() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(FakeSource::default()), config(50));
    let result = orchestrator
        .sync("u1", "  ", &SourceCredentials::default())
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn invalid_records_are_skipped_not_fatal() {
    let harness = Harness::new();
    let mut batch = records(4);
    batch[1].updated_at = None;
    batch[2].id = None;
    let source = Arc::new(FakeSource::with_records(batch));
    let orchestrator = harness.orchestrator(source, config(50));

    let result = orchestrator
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await
        .expect("sync");
    assert_eq!(result.new_observations, 2);
    assert_eq!(result.skipped_records, 2);
}

#[tokio::test]
async fn already_classified_taxon_is_applied_without_requeueing() {
    let harness = Harness::new();
    let first = harness.orchestrator(Arc::new(FakeSource::with_records(records(3))), config(50));
    first
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await
        .expect("first sync");
    let processed = harness
        .queue
        .process_batch(Some("u1"), None)
        .await
        .expect("process");
    assert_eq!(processed.processed, 3);

    let mut fresh = raw_observation(4, Some(2));
    fresh.updated_at = Some("2026-07-10T00:00:00Z".to_string());
    harness.clock.set(Utc.with_ymd_and_hms(2026, 7, 10, 6, 0, 0).unwrap());
    let second = harness.orchestrator(Arc::new(FakeSource::with_records(vec![fresh])), config(50));
    let result = second
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await
        .expect("second sync");

    assert_eq!(result.new_observations, 1);
    assert_eq!(result.queued_taxa, 0);
    let stored: Observation = harness.observations.get("u1", 4).expect("stored");
    assert_eq!(stored.rarity, Some(Rarity::Epic));
}

#[tokio::test]
async fn full_listing_smaller_than_local_set_queues_deletion_check() {
    let harness = Harness::new();
    let local: Vec<Observation> = records(5)
        .into_iter()
        .map(|raw| Observation::from_raw("u1", raw).unwrap())
        .collect();
    harness
        .observations
        .upsert_observations("u1", local)
        .await
        .expect("seed");

    let remaining: Vec<RawObservation> = records(5).into_iter().take(3).collect();
    let orchestrator =
        harness.orchestrator(Arc::new(FakeSource::with_records(remaining)), config(50));
    orchestrator
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await
        .expect("sync");

    let job = harness.reconciliations.job("u1").expect("queued");
    assert_eq!(job.status, ReconciliationStatus::Pending);
    assert_eq!(job.external_username, "naturalist");
}

#[tokio::test]
async fn capped_run_of_undated_records_does_not_resurrect_old_cursor() {
    let harness = Harness::new();
    let stale = Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap();
    harness
        .cursors
        .save_cursor(
            "u1",
            SyncCursor {
                sync_cursor: Some(stale),
                has_more_to_sync: true,
                last_synced_at: None,
            },
        )
        .await
        .expect("seed cursor");

    let undated: Vec<RawObservation> = records(120)
        .into_iter()
        .map(|mut raw| {
            raw.updated_at = None;
            raw
        })
        .collect();
    let orchestrator = harness.orchestrator(
        Arc::new(FakeSource::with_records(undated)),
        SyncConfig {
            first_sync_limit: 100,
            ..config(50)
        },
    );

    let result = orchestrator
        .sync("u1", "naturalist", &SourceCredentials::default())
        .await
        .expect("sync");
    assert!(!result.fetched_all);
    assert_eq!(result.new_observations, 0);

    let cursor = harness.cursors.get_cursor("u1").expect("cursor");
    assert_eq!(cursor.sync_cursor, None);
    assert!(cursor.has_more_to_sync);
}
