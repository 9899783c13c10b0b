use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use bioquest_core::classification::{ProcessOutcome, QueueCompletion, QueueStatus};

use super::UserId;
use crate::error::ApiResult;
use crate::main_lib::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub batch_size: Option<usize>,
}

async fn process_queue(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    body: Option<Json<ProcessRequest>>,
) -> ApiResult<Json<ProcessOutcome>> {
    let batch_size = body.and_then(|Json(b)| b.batch_size);
    let outcome = state
        .classification_queue
        .process_batch(Some(&user_id), batch_size)
        .await?;
    if outcome.processed > 0 {
        info!(
            "[RarityQueue] Processed {} jobs for {}",
            outcome.processed, user_id
        );
    }
    Ok(Json(outcome))
}

async fn queue_status(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> ApiResult<Json<QueueStatus>> {
    Ok(Json(state.classification_queue.status(&user_id)?))
}

async fn queue_completion(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> ApiResult<Json<QueueCompletion>> {
    Ok(Json(state.classification_queue.completion(&user_id)?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rarity-queue/process", post(process_queue))
        .route("/rarity-queue/status", get(queue_status))
        .route("/rarity-queue/completion", get(queue_completion))
}
