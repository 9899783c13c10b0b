use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use bioquest_core::observations::SourceCredentials;
use bioquest_core::sync::{SyncProgress, SyncResult};

use super::UserId;
use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub external_username: String,
    pub access_token: Option<String>,
}

async fn sync_observations(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(body): Json<SyncRequest>,
) -> ApiResult<Json<SyncResult>> {
    let username = body.external_username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("externalUsername is required".to_string()));
    }
    let credentials = SourceCredentials {
        access_token: body.access_token.filter(|t| !t.is_empty()),
    };

    info!("[Sync] Sync requested by {} for {}", user_id, username);
    let result = state
        .sync_service
        .sync(&user_id, username, &credentials)
        .await?;
    info!(
        "[Sync] {} new observations for {} (fetched all: {})",
        result.new_observations, user_id, result.fetched_all
    );
    Ok(Json(result))
}

async fn sync_progress(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Json<Option<SyncProgress>> {
    Json(state.sync_service.progress(&user_id))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync", post(sync_observations))
        .route("/sync/progress", get(sync_progress))
}
