use axum::{
    Json,
    extract::State,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{AppState, error::ApiError, extract::AppQuery, models::GeocodeResult};

const MIN_QUERY_CHARS: usize = 2;
const MAX_QUERY_CHARS: usize = 200;

#[derive(Debug, Deserialize, IntoParams)]
pub struct GeocodeQuery {
    /// Free-text address.
    #[param(example = "10 rue de Rivoli, Paris")]
    pub q: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReverseGeocodeQuery {
    pub lat: f64,
    pub lon: f64,
}

/// geocode
///
/// [Public Route] Address search used by the submission form to place a marker.
#[utoipa::path(
    get,
    path = "/geocode",
    params(GeocodeQuery),
    responses(
        (status = 200, description = "Matching places, best first", body = [GeocodeResult]),
        (status = 400, description = "Query too short or too long"),
        (status = 502, description = "Geocoder unavailable")
    )
)]
pub async fn geocode(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<GeocodeQuery>,
) -> Result<Json<Vec<GeocodeResult>>, ApiError> {
    let q = query.q.trim();
    let len = q.chars().count();
    if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&len) {
        return Err(ApiError::Validation(format!(
            "q must be between {MIN_QUERY_CHARS} and {MAX_QUERY_CHARS} characters"
        )));
    }

    Ok(Json(state.geocoder.search(q).await?))
}

/// reverse_geocode
///
/// [Public Route] Address of a map position, used to prefill the address field.
#[utoipa::path(
    get,
    path = "/geocode/reverse",
    params(ReverseGeocodeQuery),
    responses(
        (status = 200, description = "Closest address", body = GeocodeResult),
        (status = 400, description = "Coordinates out of range"),
        (status = 404, description = "No address at this position"),
        (status = 502, description = "Geocoder unavailable")
    )
)]
pub async fn reverse_geocode(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ReverseGeocodeQuery>,
) -> Result<Json<GeocodeResult>, ApiError> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lon) {
        return Err(ApiError::Validation(
            "lat must be within [-90, 90] and lon within [-180, 180]".to_string(),
        ));
    }

    state
        .geocoder
        .reverse(query.lat, query.lon)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no address found at this position".to_string()))
}
