//! In-memory progress reporting for running syncs.
//!
//! Finished runs stay readable for [`FINISHED_RETENTION_SECS`] and are then
//! dropped, so the map only grows with users who synced recently.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;

pub const FINISHED_RETENTION_SECS: i64 = 10 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Fetching,
    Storing,
    Calculating,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub observations_fetched: u64,
    pub observations_stored: u64,
    pub total_available: Option<u64>,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl SyncProgress {
    fn is_finished(&self) -> bool {
        matches!(self.phase, SyncPhase::Done | SyncPhase::Error)
    }
}

pub struct SyncProgressTracker {
    clock: Arc<dyn Clock>,
    entries: DashMap<String, SyncProgress>,
}

impl SyncProgressTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: DashMap::new(),
        }
    }

    fn expired(progress: &SyncProgress, now: DateTime<Utc>) -> bool {
        progress.is_finished()
            && now - progress.updated_at > Duration::seconds(FINISHED_RETENTION_SECS)
    }

    pub fn start(&self, user_id: &str) {
        let now = self.clock.now();
        self.prune(now);
        let progress = SyncProgress {
            phase: SyncPhase::Fetching,
            observations_fetched: 0,
            observations_stored: 0,
            total_available: None,
            message: "Fetching observations...".to_string(),
            updated_at: now,
        };
        self.entries.insert(user_id.to_string(), progress);
    }

    pub fn update(&self, user_id: &str, apply: impl FnOnce(&mut SyncProgress)) {
        let now = self.clock.now();
        if let Some(mut progress) = self.entries.get_mut(user_id) {
            apply(progress.value_mut());
            progress.updated_at = now;
        }
    }

    pub fn set_phase(&self, user_id: &str, phase: SyncPhase, message: impl Into<String>) {
        let message = message.into();
        self.update(user_id, |p| {
            p.phase = phase;
            p.message = message;
        });
    }

    pub fn get(&self, user_id: &str) -> Option<SyncProgress> {
        let now = self.clock.now();
        self.entries.remove_if(user_id, |_, progress| Self::expired(progress, now));
        self.entries.get(user_id).map(|progress| progress.value().clone())
    }

    /// Drops finished runs older than the retention window.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, progress| {
            let keep = !Self::expired(progress, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn tracker() -> (SyncProgressTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 7, 9, 12, 0, 0).unwrap(),
        ));
        (SyncProgressTracker::new(clock.clone()), clock)
    }

    #[test]
    fn finished_runs_expire_after_retention() {
        let (tracker, clock) = tracker();
        tracker.start("u1");
        tracker.set_phase("u1", SyncPhase::Done, "Sync complete");

        clock.advance(Duration::seconds(FINISHED_RETENTION_SECS));
        assert_eq!(tracker.get("u1").map(|p| p.phase), Some(SyncPhase::Done));

        clock.advance(Duration::seconds(1));
        assert_eq!(tracker.get("u1"), None);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn running_syncs_are_never_pruned() {
        let (tracker, clock) = tracker();
        tracker.start("slow");
        tracker.start("failed");
        tracker.set_phase("failed", SyncPhase::Error, "boom");

        clock.advance(Duration::hours(2));
        tracker.start("fresh");

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.get("failed"), None);
        assert_eq!(tracker.get("slow").map(|p| p.phase), Some(SyncPhase::Fetching));
    }
}
