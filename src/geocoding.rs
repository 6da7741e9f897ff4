use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::GeocodeResult;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoder returned an unexpected payload: {0}")]
    InvalidResponse(String),
}

/// Geocoder Trait
///
/// Abstract contract for address lookups, so handlers can be exercised without
/// reaching the public geocoding service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Forward lookup of a free-text address. Best matches first.
    async fn search(&self, query: &str) -> Result<Vec<GeocodeResult>, GeocodeError>;

    /// Reverse lookup. `None` when nothing is known at that position (open sea...).
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<GeocodeResult>, GeocodeError>;
}

/// Nominatim `jsonv2` place. Coordinates arrive as strings.
#[derive(Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

impl TryFrom<NominatimPlace> for GeocodeResult {
    type Error = GeocodeError;

    fn try_from(place: NominatimPlace) -> Result<Self, Self::Error> {
        let parse = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_| GeocodeError::InvalidResponse(format!("bad coordinate {raw:?}")))
        };

        Ok(GeocodeResult {
            latitude: parse(&place.lat)?,
            longitude: parse(&place.lon)?,
            display_name: place.display_name,
        })
    }
}

/// Reverse lookups answer `{"error": "Unable to geocode"}` with a 200 when the
/// position matches nothing.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Place(NominatimPlace),
    Miss { error: String },
}

const SEARCH_LIMIT: &str = "5";

/// NominatimGeocoder
///
/// Geocoder backed by a Nominatim-compatible HTTP API. Nominatim's usage policy
/// requires an identifying `User-Agent`.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeResult>, GeocodeError> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "jsonv2"), ("limit", SEARCH_LIMIT)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        places.into_iter().map(GeocodeResult::try_from).collect()
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        let response: ReverseResponse = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("format", "jsonv2".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response {
            ReverseResponse::Place(place) => Ok(Some(place.try_into()?)),
            ReverseResponse::Miss { error } => {
                tracing::debug!(%error, latitude, longitude, "reverse geocoding miss");
                Ok(None)
            }
        }
    }
}

/// MockGeocoder
///
/// Returns canned results. `search` filters them by case-insensitive substring;
/// `reverse` returns the first one.
#[derive(Clone, Default)]
pub struct MockGeocoder {
    pub results: Vec<GeocodeResult>,
    pub should_fail: bool,
}

impl MockGeocoder {
    pub fn new(results: Vec<GeocodeResult>) -> Self {
        Self {
            results,
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            results: Vec::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeResult>, GeocodeError> {
        if self.should_fail {
            return Err(GeocodeError::InvalidResponse(
                "Mock Geocoder Error: Simulation requested".to_string(),
            ));
        }

        let needle = query.to_lowercase();
        Ok(self
            .results
            .iter()
            .filter(|r| r.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn reverse(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        if self.should_fail {
            return Err(GeocodeError::InvalidResponse(
                "Mock Geocoder Error: Simulation requested".to_string(),
            ));
        }
        Ok(self.results.first().cloned())
    }
}

/// GeocoderState
///
/// Shared handle to the geocoder across the application state.
pub type GeocoderState = Arc<dyn Geocoder>;
