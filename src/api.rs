//! HTTP client for the marker backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::marker::{Marker, MarkerId, NewMarker};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid backend url {0:?}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend answered {status}")]
    NotOk { status: StatusCode },
    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote marker persistence. Every call works on the full list; there is
/// no pagination and no conflict handling.
#[async_trait]
pub trait MarkerApi: Send + Sync {
    async fn list_markers(&self) -> Result<Vec<Marker>, ApiError>;
    async fn create_marker(&self, marker: &NewMarker) -> Result<Marker, ApiError>;
    async fn delete_marker(&self, id: &MarkerId) -> Result<(), ApiError>;
}

/// `MarkerApi` over `GET/POST /markers` and `DELETE /markers/{id}`
pub struct HttpMarkerApi {
    client: Client,
    base: Url,
}

impl HttpMarkerApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|_| ApiError::InvalidUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Map non-2xx to `NotOk`, then decode the body
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = ensure_ok(response)?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn ensure_ok(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::NotOk { status })
    }
}

#[async_trait]
impl MarkerApi for HttpMarkerApi {
    async fn list_markers(&self) -> Result<Vec<Marker>, ApiError> {
        let response = self.client.get(self.url(&["markers"])).send().await?;
        decode(response).await
    }

    async fn create_marker(&self, marker: &NewMarker) -> Result<Marker, ApiError> {
        let response = self
            .client
            .post(self.url(&["markers"]))
            .json(marker)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_marker(&self, id: &MarkerId) -> Result<(), ApiError> {
        let id = id.to_string();
        let response = self
            .client
            .delete(self.url(&["markers", &id]))
            .send()
            .await?;
        ensure_ok(response)?;
        Ok(())
    }
}
