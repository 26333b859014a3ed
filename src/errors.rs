// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Centralized error handling for the map engine and its preview API

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Map engine error types
/// DOCUMENTATION: Every failure the widget or the preview API can report.
/// Most of these never reach the user: the widget logs and degrades instead,
/// only provider bootstrap failures and missing configuration are surfaced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Geocoding failed: {0}")]
    GeocodingFailed(String),

    #[error("Map provider failed to load: {0}")]
    ProviderLoadFailed(String),

    #[error("Map provider did not load in time")]
    ProviderTimeout,

    #[error("Routing library is not available")]
    RoutingUnavailable,

    #[error("Route request failed: {0}")]
    RouteFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
}

impl MapError {
    fn code(&self) -> (StatusCode, &'static str) {
        match self {
            MapError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            MapError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            MapError::MissingConfiguration(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "MISSING_CONFIGURATION")
            }
            MapError::GeocodingFailed(_) => (StatusCode::BAD_GATEWAY, "GEOCODING_FAILED"),
            MapError::ProviderLoadFailed(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_LOAD_FAILED"),
            MapError::ProviderTimeout => (StatusCode::GATEWAY_TIMEOUT, "PROVIDER_TIMEOUT"),
            MapError::RoutingUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "ROUTING_UNAVAILABLE")
            }
            MapError::RouteFailed(_) => (StatusCode::BAD_GATEWAY, "ROUTE_FAILED"),
            MapError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            MapError::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
        }
    }
}

/// Convert MapError to HTTP response
/// DOCUMENTATION: Maps error types to HTTP status codes and JSON responses
impl ResponseError for MapError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_code) = self.code();

        let body = json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        });

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.code().0
    }
}
