//! Per-user advisory lock for sync runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::errors::{Error, Result};

/// Tracks users with a sync run in flight. A second run for the same user is
/// rejected instead of queued.
#[derive(Debug, Clone, Default)]
pub struct SyncLocks {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, user_id: &str) -> Result<SyncLockGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(user_id.to_string()) {
            return Err(Error::SyncInFlight(user_id.to_string()));
        }
        Ok(SyncLockGuard {
            in_flight: Arc::clone(&self.in_flight),
            user_id: user_id.to_string(),
        })
    }

    pub fn is_running(&self, user_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(user_id)
    }
}

/// Releases the user's slot on drop.
#[derive(Debug)]
pub struct SyncLockGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    user_id: String,
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_user_is_rejected() {
        let locks = SyncLocks::new();
        let guard = locks.try_acquire("u1").expect("first acquire");
        assert!(matches!(
            locks.try_acquire("u1"),
            Err(Error::SyncInFlight(user)) if user == "u1"
        ));
        assert!(locks.try_acquire("u2").is_ok());
        drop(guard);
        assert!(!locks.is_running("u1"));
        assert!(locks.try_acquire("u1").is_ok());
    }
}
