// src/models/coordinate.rs
// DOCUMENTATION: Coordinate types flowing through the resolver, jitter and clustering steps
// PURPOSE: Keep "where the data says it is" apart from "where we draw it"

use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// Plain WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// geo-types convention: x = longitude, y = latitude
    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    /// Great-circle distance in meters
    pub fn distance_meters(&self, other: &LatLng) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// Which stage of the fallback chain produced a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinateSource {
    Direct,
    Geocoded,
    OwnerFallback,
}

/// A listing's best-effort real position, before privacy jitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCoordinate {
    pub listing_id: String,
    pub lat: f64,
    pub lng: f64,
    pub source: CoordinateSource,
}

impl ResolvedCoordinate {
    /// Returns None unless both numbers are finite
    pub fn new(listing_id: &str, position: LatLng, source: CoordinateSource) -> Option<Self> {
        if !position.is_finite() {
            return None;
        }

        Some(Self {
            listing_id: listing_id.to_string(),
            lat: position.lat,
            lng: position.lng,
            source,
        })
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// Resolved coordinate with its privacy offset already applied.
///
/// `lat`/`lng` are the displayed position; the offsets are kept so callers can
/// tell how far the marker was moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitteredCoordinate {
    pub listing_id: String,
    pub lat: f64,
    pub lng: f64,
    pub offset_lat: f64,
    pub offset_lng: f64,
    pub source: CoordinateSource,
}

impl JitteredCoordinate {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}
