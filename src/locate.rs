//! Current-position sources for the "locate me" action.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::geo::LatLng;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no position source configured")]
    Unavailable,
    #[error("position lookup denied: {0}")]
    Denied(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("position out of range ({lat}, {lng})")]
    InvalidPosition { lat: f64, lng: f64 },
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<LatLng, LocateError>;
}

/// A position supplied by configuration
pub struct FixedGeolocator {
    position: Option<LatLng>,
}

impl FixedGeolocator {
    pub fn new(position: Option<LatLng>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<LatLng, LocateError> {
        self.position.ok_or(LocateError::Unavailable)
    }
}

#[derive(Debug, Deserialize)]
struct IpLookup {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude", alias = "lng")]
    lon: f64,
}

/// Coarse position from an IP geolocation endpoint (ip-api.com style)
pub struct IpGeolocator {
    client: Client,
    url: String,
}

impl IpGeolocator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LocateError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn current_position(&self) -> Result<LatLng, LocateError> {
        let lookup = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<IpLookup>()
            .await?;

        if let Some(status) = lookup.status.as_deref() {
            if status != "success" {
                return Err(LocateError::Denied(
                    lookup.message.unwrap_or_else(|| status.to_string()),
                ));
            }
        }

        let position = LatLng::new(lookup.lat, lookup.lon);
        if !position.is_valid() {
            return Err(LocateError::InvalidPosition {
                lat: position.lat,
                lng: position.lng,
            });
        }
        Ok(position)
    }
}

/// Configured position first, IP lookup otherwise
pub struct ChainedGeolocator {
    sources: Vec<Box<dyn Geolocator>>,
}

impl ChainedGeolocator {
    pub fn new(sources: Vec<Box<dyn Geolocator>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Geolocator for ChainedGeolocator {
    async fn current_position(&self) -> Result<LatLng, LocateError> {
        let mut last = LocateError::Unavailable;
        for source in &self.sources {
            match source.current_position().await {
                Ok(position) => return Ok(position),
                Err(err) => last = err,
            }
        }
        Err(last)
    }
}
