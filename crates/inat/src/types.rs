//! Wire shapes of the iNaturalist responses this crate reads.

use serde::Deserialize;

use bioquest_core::observations::RawTaxon;

/// Any listing endpoint queried with `per_page=0` for its total only.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CountResponse {
    pub total_results: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearbyPlace {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// `"lat,lng"` of the place centroid.
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct NearbyPlaceGroups {
    #[serde(default)]
    pub standard: Vec<NearbyPlace>,
    #[serde(default)]
    pub community: Vec<NearbyPlace>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NearbyPlacesResponse {
    #[serde(default)]
    pub results: NearbyPlaceGroups,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesCount {
    pub count: u64,
    pub taxon: RawTaxon,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SpeciesCountsResponse {
    pub total_results: u64,
    #[serde(default)]
    pub results: Vec<SpeciesCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}
