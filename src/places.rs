//! Places autocomplete and geocoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::geo::LatLng;

/// Status string the provider returns for a usable response
pub const STATUS_OK: &str = "OK";

#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("invalid places url {0:?}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("places provider answered status {0}")]
    Status(String),
    #[error("no geocode results for {0:?}")]
    NoResults(String),
    #[error("geocode result has an invalid location ({lat}, {lng})")]
    InvalidLocation { lat: f64, lng: f64 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub place_id: String,
    pub description: String,
}

/// Autocomplete response: a status plus candidate places
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Suggestions {
    pub status: String,
    #[serde(default, rename = "predictions")]
    pub data: Vec<Suggestion>,
}

impl Suggestions {
    pub fn empty() -> Self {
        Self {
            status: String::new(),
            data: Vec::new(),
        }
    }

    /// What the search box may show: nothing unless the status is OK
    pub fn visible(&self, max: usize) -> &[Suggestion] {
        if self.status == STATUS_OK {
            &self.data[..self.data.len().min(max)]
        } else {
            &[]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeocodeResult {
    #[serde(default)]
    pub formatted_address: String,
    pub geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

/// Where autocomplete should prefer results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBias {
    pub location: LatLng,
    pub radius_m: u32,
}

#[async_trait]
pub trait PlacesClient: Send + Sync {
    async fn autocomplete(&self, input: &str) -> Result<Suggestions, PlacesError>;
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>, PlacesError>;
}

/// Extract the coordinate of a geocode result
pub fn lat_lng(result: &GeocodeResult) -> Result<LatLng, PlacesError> {
    let location = result.geometry.location;
    if location.is_valid() {
        Ok(location)
    } else {
        Err(PlacesError::InvalidLocation {
            lat: location.lat,
            lng: location.lng,
        })
    }
}

/// Geocode an address and take the first result's coordinate
pub async fn resolve_address(
    places: &dyn PlacesClient,
    address: &str,
) -> Result<LatLng, PlacesError> {
    let results = places.geocode(address).await?;
    let first = results
        .first()
        .ok_or_else(|| PlacesError::NoResults(address.to_string()))?;
    lat_lng(first)
}

/// Google Maps web service client (`place/autocomplete` and `geocode`)
pub struct GooglePlacesClient {
    client: Client,
    base: Url,
    api_key: String,
    bias: SearchBias,
}

impl GooglePlacesClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        bias: SearchBias,
        timeout: Duration,
    ) -> Result<Self, PlacesError> {
        let base =
            Url::parse(base_url).map_err(|_| PlacesError::InvalidUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(PlacesError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base,
            api_key: api_key.into(),
            bias,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl PlacesClient for GooglePlacesClient {
    async fn autocomplete(&self, input: &str) -> Result<Suggestions, PlacesError> {
        let location = self.bias.location.to_query();
        let radius = self.bias.radius_m.to_string();
        let suggestions = self
            .client
            .get(self.url(&["place", "autocomplete", "json"]))
            .query(&[
                ("input", input),
                ("key", self.api_key.as_str()),
                ("location", location.as_str()),
                ("radius", radius.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Suggestions>()
            .await?;
        Ok(suggestions)
    }

    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>, PlacesError> {
        let response = self
            .client
            .get(self.url(&["geocode", "json"]))
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<GeocodeResponse>()
            .await?;

        match response.status.as_str() {
            STATUS_OK => Ok(response.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(PlacesError::Status(response.status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn suggestions(status: &str, n: usize) -> Suggestions {
        Suggestions {
            status: status.to_string(),
            data: (0..n)
                .map(|i| Suggestion {
                    place_id: format!("p{i}"),
                    description: format!("Place {i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_visible_requires_ok_status() {
        assert_eq!(suggestions("OK", 3).visible(5).len(), 3);
        assert_eq!(suggestions("OK", 8).visible(5).len(), 5);
        assert!(suggestions("ZERO_RESULTS", 3).visible(5).is_empty());
        assert!(suggestions("REQUEST_DENIED", 3).visible(5).is_empty());
        assert!(Suggestions::empty().visible(5).is_empty());
    }

    #[test]
    fn test_lat_lng_rejects_invalid() {
        let result = GeocodeResult {
            formatted_address: String::new(),
            geometry: Geometry {
                location: LatLng::new(120.0, 0.0),
            },
        };
        assert!(matches!(lat_lng(&result), Err(PlacesError::InvalidLocation { .. })));
    }

    async fn autocomplete(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        if q.get("key").map(String::as_str) != Some("test-key") {
            return Json(json!({ "status": "REQUEST_DENIED", "predictions": [] }));
        }
        assert_eq!(q.get("location").map(String::as_str), Some("40.584221,-73.820343"));
        assert_eq!(q.get("radius").map(String::as_str), Some("200000"));
        Json(json!({
            "status": "OK",
            "predictions": [
                { "place_id": "t1", "description": format!("{}, ON, Canada", q["input"]) }
            ]
        }))
    }

    async fn geocode(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        match q.get("address").map(String::as_str) {
            Some("Toronto, ON") => Json(json!({
                "status": "OK",
                "results": [{
                    "formatted_address": "Toronto, ON, Canada",
                    "geometry": { "location": { "lat": 43.6532, "lng": -79.3832 } }
                }]
            })),
            Some("broken") => Json(json!({ "status": "OVER_QUERY_LIMIT", "results": [] })),
            _ => Json(json!({ "status": "ZERO_RESULTS", "results": [] })),
        }
    }

    async fn spawn_provider() -> String {
        let router = Router::new()
            .route("/maps/api/place/autocomplete/json", get(autocomplete))
            .route("/maps/api/geocode/json", get(geocode));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/maps/api")
    }

    fn client(base: &str, key: &str) -> GooglePlacesClient {
        let bias = SearchBias {
            location: LatLng::new(40.584221, -73.820343),
            radius_m: 200_000,
        };
        GooglePlacesClient::new(base, key, bias, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_autocomplete_sends_bias_and_key() {
        let places = client(&spawn_provider().await, "test-key");
        let s = places.autocomplete("Toronto").await.unwrap();
        assert_eq!(s.visible(5)[0].description, "Toronto, ON, Canada");
    }

    #[tokio::test]
    async fn test_autocomplete_denied_shows_nothing() {
        let places = client(&spawn_provider().await, "wrong");
        let s = places.autocomplete("Toronto").await.unwrap();
        assert_eq!(s.status, "REQUEST_DENIED");
        assert!(s.visible(5).is_empty());
    }

    #[tokio::test]
    async fn test_resolve_address() {
        let places = client(&spawn_provider().await, "test-key");
        let point = resolve_address(&places, "Toronto, ON").await.unwrap();
        assert!((point.lat - 43.65).abs() < 0.01);
        assert!((point.lng + 79.38).abs() < 0.01);

        assert!(matches!(
            resolve_address(&places, "Atlantis").await,
            Err(PlacesError::NoResults(_))
        ));
        assert!(matches!(
            resolve_address(&places, "broken").await,
            Err(PlacesError::Status(s)) if s == "OVER_QUERY_LIMIT"
        ));
    }
}
