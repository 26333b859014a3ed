// src/models/listing.rs
// DOCUMENTATION: Listing data as supplied by the catalog
// PURPOSE: Input side of the map pipeline (read-only, never mutated here)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::LatLng;

/// A coordinate as the catalog stores it: sometimes a number, sometimes a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinate {
    Number(f64),
    Text(String),
}

impl RawCoordinate {
    /// Parse as a number; None for anything that is not a finite value
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            RawCoordinate::Number(n) => *n,
            RawCoordinate::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for RawCoordinate {
    fn from(value: f64) -> Self {
        RawCoordinate::Number(value)
    }
}

fn parse_pair(lat: &Option<RawCoordinate>, lng: &Option<RawCoordinate>) -> Option<LatLng> {
    let lat = lat.as_ref()?.as_f64()?;
    let lng = lng.as_ref()?.as_f64()?;
    Some(LatLng::new(lat, lng))
}

/// Fields shown inside a listing's info overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListingDisplay {
    #[validate(length(max = 255))]
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub category: Option<String>,

    /// Preformatted price (e.g. "CHF 80 / h")
    #[serde(default)]
    pub price_label: Option<String>,
}

/// Location-related view of one listing
/// DOCUMENTATION: Everything the resolver needs to place a listing on the map,
/// plus creation time (cluster ordering) and display fields (overlay content)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListingLocationInput {
    #[validate(length(min = 1, max = 128))]
    pub id: String,

    #[serde(default)]
    pub location_lat: Option<RawCoordinate>,

    #[serde(default)]
    pub location_lng: Option<RawCoordinate>,

    /// Provider's own position, used only when nothing better is known
    #[serde(default)]
    pub owner_lat: Option<RawCoordinate>,

    #[serde(default)]
    pub owner_lng: Option<RawCoordinate>,

    /// Free-text addresses, first one is primary
    #[serde(default)]
    #[validate(length(max = 16))]
    pub addresses: Vec<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    #[validate]
    pub display: ListingDisplay,
}

impl ListingLocationInput {
    pub fn new(id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            location_lat: None,
            location_lng: None,
            owner_lat: None,
            owner_lng: None,
            addresses: Vec::new(),
            created_at,
            display: ListingDisplay::default(),
        }
    }

    pub fn with_location(mut self, lat: impl Into<RawCoordinate>, lng: impl Into<RawCoordinate>) -> Self {
        self.location_lat = Some(lat.into());
        self.location_lng = Some(lng.into());
        self
    }

    pub fn with_owner_location(mut self, lat: impl Into<RawCoordinate>, lng: impl Into<RawCoordinate>) -> Self {
        self.owner_lat = Some(lat.into());
        self.owner_lng = Some(lng.into());
        self
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.addresses.push(address.to_string());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.display.title = title.to_string();
        self
    }

    pub fn direct_coordinate(&self) -> Option<LatLng> {
        parse_pair(&self.location_lat, &self.location_lng)
    }

    pub fn owner_coordinate(&self) -> Option<LatLng> {
        parse_pair(&self.owner_lat, &self.owner_lng)
    }

    /// First address string, if it has any content
    pub fn primary_address(&self) -> Option<&str> {
        self.addresses
            .first()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
    }

    /// Title used in overlays, falls back to the id
    pub fn label(&self) -> &str {
        if self.display.title.trim().is_empty() {
            &self.id
        } else {
            &self.display.title
        }
    }
}
