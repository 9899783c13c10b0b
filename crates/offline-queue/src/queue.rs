use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::Result;
use crate::executor::ActionExecutor;
use crate::model::{ActionType, DrainReport, DroppedAction, OfflineAction, MAX_RETRIES};
use crate::store::QueueStore;

enum Outcome {
    Succeeded,
    Failed(String),
}

/// Durable queue of actions replayed against the server once back online.
pub struct OfflineQueue {
    store: Arc<dyn QueueStore>,
    executor: Arc<dyn ActionExecutor>,
    /// Serializes read-modify-write cycles on the store.
    writes: Mutex<()>,
    /// Held for the whole of a drain.
    drain_gate: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn QueueStore>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            store,
            executor,
            writes: Mutex::new(()),
            drain_gate: Mutex::new(()),
        }
    }

    pub async fn queue_action(
        &self,
        action_type: ActionType,
        payload: Value,
    ) -> Result<OfflineAction> {
        let action = OfflineAction::new(action_type, payload);
        let _guard = self.writes.lock().await;
        let mut actions = self.store.load().await?;
        actions.push(action.clone());
        self.store.save(&actions).await?;
        debug!(
            "[OfflineQueue] Queued {:?} ({} pending)",
            action.action_type,
            actions.len()
        );
        Ok(action)
    }

    pub async fn get_queue_count(&self) -> Result<usize> {
        Ok(self.store.load().await?.len())
    }

    pub async fn clear_queue(&self) -> Result<()> {
        let _guard = self.writes.lock().await;
        self.store.clear().await
    }

    /// Replays queued actions front to back. Each outcome is committed before
    /// the next action runs, so an interrupted drain never replays a success.
    pub async fn process_queue(&self) -> Result<DrainReport> {
        let Ok(_drain) = self.drain_gate.try_lock() else {
            debug!("[OfflineQueue] Drain already in progress");
            return Ok(DrainReport {
                already_running: true,
                ..DrainReport::default()
            });
        };

        let snapshot = {
            let _guard = self.writes.lock().await;
            self.store.load().await?
        };
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }
        info!("[OfflineQueue] Processing {} queued actions", snapshot.len());

        let mut report = DrainReport::default();
        let mut blocked: HashSet<ActionType> = HashSet::new();
        for action in snapshot {
            if blocked.contains(&action.action_type) {
                report.deferred += 1;
                continue;
            }
            let outcome = match self.executor.execute(&action).await {
                Ok(()) => Outcome::Succeeded,
                Err(e) => {
                    warn!(
                        "[OfflineQueue] {:?} failed (attempt {}): {}",
                        action.action_type,
                        action.retries + 1,
                        e
                    );
                    Outcome::Failed(e.to_string())
                }
            };
            self.commit(action, outcome, &mut report, &mut blocked).await?;
        }

        info!(
            "[OfflineQueue] Drain finished: {} succeeded, {} failed, {} deferred, {} dropped",
            report.succeeded,
            report.failed,
            report.deferred,
            report.dropped.len()
        );
        Ok(report)
    }

    async fn commit(
        &self,
        action: OfflineAction,
        outcome: Outcome,
        report: &mut DrainReport,
        blocked: &mut HashSet<ActionType>,
    ) -> Result<()> {
        let _guard = self.writes.lock().await;
        let mut actions = self.store.load().await?;
        let position = find_index(&actions, action.id);

        match outcome {
            Outcome::Succeeded => {
                report.succeeded += 1;
                if let Some(i) = position {
                    actions.remove(i);
                }
            }
            Outcome::Failed(message) => {
                report.failed += 1;
                let retries = action.retries + 1;
                if retries >= MAX_RETRIES {
                    error!(
                        "[OfflineQueue] Dropping {:?} after {} attempts",
                        action.action_type, retries
                    );
                    if let Some(i) = position {
                        actions.remove(i);
                    }
                    report.dropped.push(DroppedAction {
                        action: OfflineAction { retries, ..action },
                        error: message,
                    });
                } else {
                    if let Some(i) = position {
                        actions[i].retries = retries;
                    }
                    blocked.insert(action.action_type);
                }
            }
        }
        self.store.save(&actions).await
    }
}

fn find_index(actions: &[OfflineAction], id: Uuid) -> Option<usize> {
    actions.iter().position(|a| a.id == id)
}

/// Drains `queue` every time `online` flips to `true`.
pub fn spawn_reconnect_listener(
    queue: Arc<OfflineQueue>,
    mut online: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while online.changed().await.is_ok() {
            if !*online.borrow_and_update() {
                continue;
            }
            info!("[OfflineQueue] Connectivity restored, draining queue");
            if let Err(e) = queue.process_queue().await {
                error!("[OfflineQueue] Drain after reconnect failed: {}", e);
            }
        }
    })
}
