use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use bioquest_core::observations::Coordinates;
use bioquest_core::recommendations::RecommendationsResponse;

use super::reconciliation::credentials_from;
use super::UserId;
use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationsQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheClearResponse {
    cleared: usize,
}

async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    headers: HeaderMap,
    Query(query): Query<RecommendationsQuery>,
) -> ApiResult<Json<RecommendationsResponse>> {
    let coordinates = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)?),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "lat and lng must be given together".to_string(),
            ))
        }
    };
    let response = state
        .recommendation_service
        .recommendations(&user_id, coordinates, &credentials_from(&headers))
        .await?;
    Ok(Json(response))
}

async fn clear_cache(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Json<CacheClearResponse> {
    let cleared = state.recommendation_service.clear_user(&user_id);
    info!("[RecommendationCache] Cleared {} entries for {}", cleared, user_id);
    Json(CacheClearResponse { cleared })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", get(get_recommendations))
        .route("/recommendations/cache", delete(clear_cache))
}
