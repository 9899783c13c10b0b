use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use tracing::info;

use bioquest_core::observations::SourceCredentials;
use bioquest_core::reconciliation::ReconciliationOutcome;

use super::UserId;
use crate::error::ApiResult;
use crate::main_lib::AppState;

/// Optional bearer token forwarded to the observation source.
pub(super) fn credentials_from(headers: &HeaderMap) -> SourceCredentials {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    match token {
        Some(token) => SourceCredentials::bearer(token),
        None => SourceCredentials::default(),
    }
}

async fn process_reconciliation(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    headers: HeaderMap,
) -> ApiResult<Json<ReconciliationOutcome>> {
    let outcome = state
        .reconciliation_service
        .process_next(&user_id, &credentials_from(&headers))
        .await?;
    if outcome.processed {
        info!(
            "[Reconcile] Removed {} deleted observations for {}",
            outcome.deleted, user_id
        );
    }
    Ok(Json(outcome))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/reconciliation/process", post(process_reconciliation))
}
