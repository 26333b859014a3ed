// src/services/geocoding_client.rs
// DOCUMENTATION: Geocoding collaborator and its Nominatim adapter
// PURPOSE: Turn a free-text address into a coordinate for the resolver chain

use crate::errors::MapError;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::GeocodeCache;

/// Successful geocoder answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

/// Address lookup capability used by the coordinate resolver
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeocodeResult, MapError>;
}

/// One hit of a Nominatim /search response (coordinates come back as strings)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

impl NominatimPlace {
    fn into_result(self) -> Option<GeocodeResult> {
        let lat = self.lat.trim().parse::<f64>().ok()?;
        let lng = self.lon.trim().parse::<f64>().ok()?;

        (lat.is_finite() && lng.is_finite()).then(|| GeocodeResult {
            lat,
            lng,
            display_name: self.display_name,
        })
    }
}

/// Nominatim-compatible geocoding client
/// DOCUMENTATION: Rate limited (the public instance allows 1 request/s) and
/// backed by the shared GeocodeCache when one is attached
pub struct NominatimClient {
    client: Client,
    base_url: String,
    user_agent: String,
    limiter: DefaultDirectRateLimiter,
    cache: Option<Arc<GeocodeCache>>,
}

impl NominatimClient {
    pub fn new(base_url: String, user_agent: String, requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            cache: None,
        }
    }

    pub fn new_with_cache(
        base_url: String,
        user_agent: String,
        requests_per_second: u32,
        cache: Arc<GeocodeCache>,
    ) -> Self {
        let mut client = Self::new(base_url, user_agent, requests_per_second);
        client.cache = Some(cache);
        client
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    async fn lookup(&self, address: &str) -> Result<GeocodeResult, MapError> {
        self.limiter.until_ready().await;

        log::debug!("Geocoding address: {}", address);

        let response = self
            .client
            .get(self.search_url())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| MapError::GeocodingFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MapError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MapError::GeocodingFailed(format!("API error {}: {}", status, body)));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| MapError::GeocodingFailed(format!("Parse error: {}", e)))?;

        places
            .into_iter()
            .next()
            .and_then(NominatimPlace::into_result)
            .ok_or_else(|| MapError::GeocodingFailed(format!("No result for '{}'", address)))
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, address: &str) -> Result<GeocodeResult, MapError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(address).await {
                return Ok(hit);
            }
        }

        let result = self.lookup(address).await?;

        if let Some(cache) = &self.cache {
            cache.set(address, result.clone()).await;
        }

        Ok(result)
    }
}
