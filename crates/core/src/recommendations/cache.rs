//! TTL cache keyed by user and a coarse coordinate bucket.
//!
//! Entries expire lazily on read and are also swept on a fixed schedule by
//! [`spawn_cleanup_task`].

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::observations::Coordinates;

pub const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;
pub const CLEANUP_INTERVAL_SECS: u64 = 60 * 60;
/// Requests within 0.01 degrees share an entry.
const BUCKETS_PER_DEGREE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    user_id: String,
    lat_bucket: i64,
    lng_bucket: i64,
}

impl CacheKey {
    pub fn new(user_id: &str, coordinates: Coordinates) -> Self {
        Self {
            user_id: user_id.to_string(),
            lat_bucket: (coordinates.latitude * BUCKETS_PER_DEGREE).round() as i64,
            lng_bucket: (coordinates.longitude * BUCKETS_PER_DEGREE).round() as i64,
        }
    }
}

struct CacheEntry<T> {
    data: T,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
}

pub struct RecommendationCache<T> {
    entries: DashMap<CacheKey, CacheEntry<T>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<T: Clone> RecommendationCache<T> {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            ttl,
        }
    }

    pub fn get(&self, user_id: &str, coordinates: Coordinates) -> Option<T> {
        let key = CacheKey::new(user_id, coordinates);
        let now = self.clock.now();
        match self.entries.get(&key) {
            None => return None,
            Some(entry) if now <= entry.expires_at => return Some(entry.data.clone()),
            Some(_) => {}
        }

        // A concurrent `set` may have refreshed the entry since the read.
        self.entries.remove_if(&key, |_, entry| now > entry.expires_at);
        self.entries.get(&key).map(|entry| entry.value().data.clone())
    }

    pub fn set(&self, user_id: &str, coordinates: Coordinates, data: T) {
        self.set_with_ttl(user_id, coordinates, data, self.ttl);
    }

    pub fn set_with_ttl(&self, user_id: &str, coordinates: Coordinates, data: T, ttl: Duration) {
        let entry = CacheEntry {
            data,
            expires_at: self.clock.now() + ttl,
        };
        self.entries.insert(CacheKey::new(user_id, coordinates), entry);
    }

    /// Removes every entry of one user. Returns how many were dropped.
    pub fn clear_user(&self, user_id: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = key.user_id != user_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Drops expired entries regardless of read traffic.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now <= entry.expires_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
        }
    }
}

/// Runs `cleanup` every `interval` until the returned handle is aborted.
pub fn spawn_cleanup_task<T>(
    cache: Arc<RecommendationCache<T>>,
    interval: std::time::Duration,
) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.cleanup();
            if removed > 0 {
                debug!(
                    "[RecommendationCache] Swept {} expired entr{}",
                    removed,
                    if removed == 1 { "y" } else { "ies" }
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn coords(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    fn cache() -> (RecommendationCache<Vec<u32>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap(),
        ));
        (
            RecommendationCache::new(clock.clone(), Duration::hours(24)),
            clock,
        )
    }

    #[test]
    fn hit_within_ttl_and_lazy_eviction_after() {
        let (cache, clock) = cache();
        cache.set("u1", coords(37.7749, -122.4194), vec![1, 2]);
        assert_eq!(cache.get("u1", coords(37.7749, -122.4194)), Some(vec![1, 2]));

        clock.advance(Duration::hours(24) + Duration::seconds(1));
        assert_eq!(cache.get("u1", coords(37.7749, -122.4194)), None);
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn nearby_coordinates_share_a_bucket() {
        let (cache, _clock) = cache();
        cache.set("u1", coords(37.7749, -122.4194), vec![7]);
        assert_eq!(cache.get("u1", coords(37.7712, -122.4221)), Some(vec![7]));
        assert_eq!(cache.get("u1", coords(37.80, -122.42)), None);
    }

    #[test]
    fn clear_user_leaves_other_users_intact() {
        let (cache, _clock) = cache();
        cache.set("u1", coords(10.0, 10.0), vec![1]);
        cache.set("u1", coords(20.0, 20.0), vec![2]);
        cache.set("u2", coords(10.0, 10.0), vec![3]);

        assert_eq!(cache.clear_user("u1"), 2);
        assert_eq!(cache.get("u1", coords(10.0, 10.0)), None);
        assert_eq!(cache.get("u2", coords(10.0, 10.0)), Some(vec![3]));
    }

    #[test]
    fn cleanup_sweeps_without_reads() {
        let (cache, clock) = cache();
        cache.set_with_ttl("u1", coords(1.0, 1.0), vec![1], Duration::minutes(5));
        cache.set("u1", coords(2.0, 2.0), vec![2]);

        clock.advance(Duration::minutes(10));
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.stats().total_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_runs_on_schedule() {
        let (cache, clock) = cache();
        let cache = Arc::new(cache);
        cache.set_with_ttl("u1", coords(1.0, 1.0), vec![1], Duration::minutes(5));
        clock.advance(Duration::minutes(10));

        let handle = spawn_cleanup_task(cache.clone(), std::time::Duration::from_secs(60));
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.stats().total_entries, 0);
        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_users_do_not_clobber_each_other() {
        let (cache, _clock) = cache();
        let cache = Arc::new(cache);
        let writers: Vec<_> = (0..8u32)
            .map(|n| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let user = format!("u{}", n);
                    for i in 0..25 {
                        cache.set(&user, coords(f64::from(i), 0.0), vec![n]);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        assert_eq!(cache.stats().total_entries, 200);
        assert_eq!(cache.get("u3", coords(7.0, 0.0)), Some(vec![3]));
        assert_eq!(cache.clear_user("u3"), 25);
        assert_eq!(cache.stats().total_entries, 175);
    }
}
