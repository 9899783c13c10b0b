use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failed replays an action survives before it is dropped.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SyncObservations,
    UpdateObservation,
    MarkObservation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    /// Local handle; never sent to the server.
    pub id: Uuid,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub retries: u32,
}

impl OfflineAction {
    pub fn new(action_type: ActionType, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            payload,
            enqueued_at: Utc::now(),
            retries: 0,
        }
    }
}

/// An action removed after exhausting its retries, kept for the user to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedAction {
    pub action: OfflineAction,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Left untouched because an earlier action of the same type is still queued.
    pub deferred: usize,
    pub dropped: Vec<DroppedAction>,
    /// Another drain was already running; nothing was attempted.
    pub already_running: bool,
}
