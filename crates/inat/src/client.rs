//! HTTP client for the iNaturalist v1 API.

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use bioquest_core::errors::SourceError;
use bioquest_core::observations::{
    Coordinates, ObservationPage, ObservationSource, PageRequest, SourceCredentials,
};

use crate::error::{INatError, Result};
use crate::types::{
    ApiErrorResponse, CountResponse, NearbyPlace, NearbyPlacesResponse, SpeciesCount,
    SpeciesCountsResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://api.inaturalist.org/v1";
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
const KM_PER_DEGREE_LAT: f64 = 111.0;

/// Rate-limited client. Clones share the quota.
#[derive(Clone)]
pub struct INatClient {
    client: reqwest::Client,
    base_url: String,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl INatClient {
    pub fn new(base_url: &str, requests_per_minute: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("bioquest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    fn headers(credentials: &SourceCredentials) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = credentials.access_token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| INatError::Auth("Invalid access token format".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("iNaturalist response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        warn!("iNaturalist response error ({}): {}", status, preview);
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| format!("Request failed: {}", body));
            return Err(INatError::api(status.as_u16(), message));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Waits for quota, then issues `GET {base_url}{path_and_query}`.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path_and_query: &str,
        credentials: &SourceCredentials,
    ) -> Result<T> {
        self.limiter.until_ready().await;
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .headers(Self::headers(credentials)?)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// One page of a user's observations, oldest update first.
    pub async fn observations_page(
        &self,
        credentials: &SourceCredentials,
        request: &PageRequest,
    ) -> Result<ObservationPage> {
        if request.username.trim().is_empty() {
            return Err(INatError::InvalidRequest("username is required".into()));
        }
        let mut query = format!(
            "/observations?user_login={}&per_page={}&page={}&order_by=updated_at&order=asc",
            urlencoding::encode(request.username.trim()),
            request.per_page,
            request.page.max(1),
        );
        if let Some(since) = request.updated_since {
            query.push_str("&updated_since=");
            query.push_str(&urlencoding::encode(
                &since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        self.get_json(&query, credentials).await
    }

    pub async fn taxon_count(&self, taxon_id: i64, place_id: Option<i64>) -> Result<u64> {
        let mut query = format!("/observations?taxon_id={}&per_page=0", taxon_id);
        if let Some(place_id) = place_id {
            query.push_str(&format!("&place_id={}", place_id));
        }
        let response: CountResponse = self
            .get_json(&query, &SourceCredentials::default())
            .await?;
        Ok(response.total_results)
    }

    /// Places whose centroid falls inside a square of `radius_km` around `center`.
    pub async fn nearby_places(
        &self,
        credentials: &SourceCredentials,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<NearbyPlace>> {
        let d_lat = radius_km / KM_PER_DEGREE_LAT;
        let d_lng = radius_km / (KM_PER_DEGREE_LAT * center.latitude.to_radians().cos().max(0.01));
        let query = format!(
            "/places/nearby?nelat={:.4}&nelng={:.4}&swlat={:.4}&swlng={:.4}&per_page=20",
            (center.latitude + d_lat).min(90.0),
            (center.longitude + d_lng).min(180.0),
            (center.latitude - d_lat).max(-90.0),
            (center.longitude - d_lng).max(-180.0),
        );
        let response: NearbyPlacesResponse = self.get_json(&query, credentials).await?;
        let mut places = response.results.standard;
        places.extend(response.results.community);
        Ok(places)
    }

    /// Total species recorded at a place plus the `per_page` most observed.
    pub async fn place_species_counts(
        &self,
        credentials: &SourceCredentials,
        place_id: i64,
        per_page: u32,
    ) -> Result<(u64, Vec<SpeciesCount>)> {
        let query = format!(
            "/observations/species_counts?place_id={}&per_page={}",
            place_id, per_page
        );
        let response: SpeciesCountsResponse = self.get_json(&query, credentials).await?;
        Ok((response.total_results, response.results))
    }

    /// Observations made at a place on or after `since`.
    pub async fn place_observation_count(
        &self,
        credentials: &SourceCredentials,
        place_id: i64,
        since: NaiveDate,
    ) -> Result<u64> {
        let query = format!(
            "/observations?place_id={}&d1={}&per_page=0",
            place_id,
            since.format("%Y-%m-%d")
        );
        let response: CountResponse = self.get_json(&query, credentials).await?;
        Ok(response.total_results)
    }
}

#[async_trait]
impl ObservationSource for INatClient {
    async fn fetch_observations(
        &self,
        credentials: &SourceCredentials,
        request: &PageRequest,
    ) -> std::result::Result<ObservationPage, SourceError> {
        Ok(self.observations_page(credentials, request).await?)
    }

    async fn taxon_observation_count(
        &self,
        taxon_id: i64,
        place_id: Option<i64>,
    ) -> std::result::Result<u64, SourceError> {
        Ok(self.taxon_count(taxon_id, place_id).await?)
    }
}
