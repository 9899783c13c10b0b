use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use crate::error::{OfflineQueueError, Result};
use crate::model::{ActionType, OfflineAction};

const USER_HEADER: &str = "x-user-id";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Replays one queued action against the server.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &OfflineAction) -> Result<()>;
}

pub struct HttpActionExecutor {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl HttpActionExecutor {
    pub fn new(base_url: &str, user_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
        })
    }

    fn observation_id(payload: &Value) -> Result<i64> {
        payload
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| OfflineQueueError::InvalidPayload("observation id is missing".into()))
    }

    fn request_for(action: &OfflineAction) -> Result<(Method, String, Value)> {
        let data = || action.payload.get("data").cloned().unwrap_or(Value::Null);
        Ok(match action.action_type {
            ActionType::SyncObservations => {
                (Method::POST, "/api/sync".to_string(), action.payload.clone())
            }
            ActionType::UpdateObservation => (
                Method::PATCH,
                format!("/api/observations/{}", Self::observation_id(&action.payload)?),
                data(),
            ),
            ActionType::MarkObservation => (
                Method::POST,
                format!("/api/observations/{}/mark", Self::observation_id(&action.payload)?),
                data(),
            ),
        })
    }
}

#[async_trait]
impl ActionExecutor for HttpActionExecutor {
    async fn execute(&self, action: &OfflineAction) -> Result<()> {
        let (method, path, body) = Self::request_for(action)?;
        let url = format!("{}{}", self.base_url, path);
        debug!("[OfflineQueue] Replaying {:?} via {} {}", action.action_type, method, url);

        let response = self
            .client
            .request(method, &url)
            .header(USER_HEADER, &self.user_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(OfflineQueueError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
