// src/config/env.rs
// DOCUMENTATION: Environment variable management
// PURPOSE: Load and validate configuration from .env files

use crate::models::LatLng;
use crate::services::WidgetSettings;
use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
/// DOCUMENTATION: Centralizes all configuration in one struct
/// Load with Config::from_env() at application startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1")
    pub server_address: String,

    /// Server listen port (default 8003)
    pub server_port: u16,

    /// Environment: development, staging, production
    pub environment: String,

    /// Log level: debug, info, warn, error
    pub log_level: String,

    /// Map provider API key (the browser map script refuses to load without it)
    pub map_provider_api_key: String,

    /// Base URL used for the "open in the provider's site" escape hatch
    pub provider_deep_link_base: String,

    /// Geocoder base URL (Nominatim-compatible)
    pub geocoder_base_url: String,

    /// User-Agent sent to the geocoder (required by the Nominatim usage policy)
    pub geocoder_user_agent: String,

    /// Maximum geocoding requests per second
    pub geocode_requests_per_second: u32,

    /// Geocode cache TTL in seconds
    pub geocode_cache_ttl: u64,

    /// Seconds to wait for the provider script before giving up
    pub bootstrap_timeout_secs: u64,

    /// Map center used when the user's position is unknown
    pub default_center_lat: f64,
    pub default_center_lng: f64,

    /// Initial zoom level
    pub default_zoom: u8,

    /// Cluster grid step in degrees
    pub cluster_grid_step: f64,

    /// Privacy jitter amplitude in degrees
    pub jitter_amplitude: f64,

    /// Viewport padding (px) when fitting a route or a layout
    pub fit_padding_px: u32,

    /// Upper bound on listings accepted by one layout request
    pub max_layout_listings: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    /// DOCUMENTATION: Reads from .env or process environment
    /// Called once at application startup
    pub fn from_env() -> Self {
        dotenv().ok();

        Config {
            server_address: env::var("SERVER_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("SERVER_PORT", 8003),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            map_provider_api_key: env::var("MAP_PROVIDER_API_KEY").unwrap_or_default(),
            provider_deep_link_base: env::var("PROVIDER_DEEP_LINK_BASE")
                .unwrap_or_else(|_| "https://www.google.com/maps/search/".to_string()),
            geocoder_base_url: env::var("GEOCODER_BASE_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| format!("nearby-map/{}", env!("CARGO_PKG_VERSION"))),
            geocode_requests_per_second: env_or("GEOCODE_REQUESTS_PER_SECOND", 1),
            geocode_cache_ttl: env_or("GEOCODE_CACHE_TTL", 86_400),
            bootstrap_timeout_secs: env_or("BOOTSTRAP_TIMEOUT_SECS", 10),
            default_center_lat: env_or("DEFAULT_CENTER_LAT", 47.3769),
            default_center_lng: env_or("DEFAULT_CENTER_LNG", 8.5417),
            default_zoom: env_or("DEFAULT_ZOOM", 13),
            cluster_grid_step: env_or("CLUSTER_GRID_STEP", 0.008),
            jitter_amplitude: env_or("JITTER_AMPLITUDE", 0.0025),
            fit_padding_px: env_or("FIT_PADDING_PX", 50),
            max_layout_listings: env_or("MAX_LAYOUT_LISTINGS", 500),
        }
    }

    /// Validate critical configuration
    /// DOCUMENTATION: Ensures application can start safely
    pub fn validate(&self) -> Result<(), String> {
        if self.geocoder_base_url.is_empty() {
            return Err("GEOCODER_BASE_URL is required".to_string());
        }

        if self.geocode_requests_per_second == 0 {
            return Err("GEOCODE_REQUESTS_PER_SECOND must be at least 1".to_string());
        }

        if !(self.cluster_grid_step.is_finite() && self.cluster_grid_step > 0.0) {
            return Err("CLUSTER_GRID_STEP must be a positive number".to_string());
        }

        if !(self.jitter_amplitude.is_finite() && self.jitter_amplitude >= 0.0) {
            return Err("JITTER_AMPLITUDE must be a non-negative number".to_string());
        }

        if self.map_provider_api_key.is_empty() {
            log::warn!("MAP_PROVIDER_API_KEY not configured - browser widgets will not activate");
        }

        Ok(())
    }

    /// Settings handed to every MapWidget built by this process
    pub fn widget_settings(&self) -> WidgetSettings {
        WidgetSettings {
            provider_api_key: self.map_provider_api_key.clone(),
            bootstrap_timeout: Duration::from_secs(self.bootstrap_timeout_secs),
            provider_deep_link_base: self.provider_deep_link_base.clone(),
            default_center: LatLng::new(self.default_center_lat, self.default_center_lng),
            default_zoom: self.default_zoom,
            grid_step: self.cluster_grid_step,
            jitter_amplitude: self.jitter_amplitude,
            fit_padding_px: self.fit_padding_px,
        }
    }
}
