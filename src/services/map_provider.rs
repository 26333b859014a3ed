// src/services/map_provider.rs
// DOCUMENTATION: Capability interface of the external map/directions provider
// PURPOSE: Everything the widget asks of the map library goes through here

use crate::errors::MapError;
use crate::models::{ClusterKey, LatLng};
use async_trait::async_trait;
use geo_types::Rect;
use serde::Serialize;
use uuid::Uuid;

macro_rules! handle_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

handle_type!(MapHandle);
handle_type!(MarkerHandle);
handle_type!(OverlayHandle);
handle_type!(RendererHandle);

/// Visual weight of a marker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerStyle {
    User,
    Single,
    Cluster { count: usize },
}

impl MarkerStyle {
    pub fn color(&self) -> &'static str {
        match self {
            MarkerStyle::User => "#2563eb",
            MarkerStyle::Single => "#f97316",
            MarkerStyle::Cluster { .. } => "#dc2626",
        }
    }

    /// Icon scale factor, clusters grow slowly with their size
    pub fn scale(&self) -> f64 {
        match self {
            MarkerStyle::User => 1.0,
            MarkerStyle::Single => 1.0,
            MarkerStyle::Cluster { count } => (1.0 + (*count as f64).log10() * 0.5).min(2.0),
        }
    }

    pub fn label(&self) -> Option<String> {
        match self {
            MarkerStyle::Cluster { count } => Some(count.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub position: LatLng,
    pub style: MarkerStyle,
    pub title: String,
    /// Cluster the marker stands for (None for the user marker)
    pub cluster: Option<ClusterKey>,
}

/// Text shown in an info overlay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayContent {
    pub heading: String,
    pub lines: Vec<String>,
    /// Listings the overlay offers directions to, in display order
    pub listing_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TravelMode {
    Driving,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRequest {
    pub origin: LatLng,
    pub destination: LatLng,
    pub travel_mode: TravelMode,
    pub provide_alternatives: bool,
}

impl RouteRequest {
    pub fn driving(origin: LatLng, destination: LatLng) -> Self {
        Self {
            origin,
            destination,
            travel_mode: TravelMode::Driving,
            provide_alternatives: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub path: Vec<LatLng>,
    pub bounds: Rect<f64>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// User interaction delivered by the provider's event listeners
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    MarkerClicked(MarkerHandle),
    BackgroundClicked,
    DirectionsRequested { listing_id: String },
}

/// Map/directions capability
/// DOCUMENTATION: The browser adapter backs this with the injected script;
/// `HeadlessMapProvider` backs it in-process. Loading may suspend, drawing
/// primitives are synchronous like the underlying library calls.
#[async_trait]
pub trait MapProvider: Send + Sync {
    /// False for adapters that do not talk to the hosted provider
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Main script already present (e.g. from a previous mount)
    fn is_loaded(&self) -> bool;

    /// Inject and load the main script. May never resolve when blocked;
    /// callers bound it with a timeout.
    async fn ensure_loaded(&self) -> Result<(), MapError>;

    fn is_routing_loaded(&self) -> bool;

    async fn ensure_routing_loaded(&self) -> Result<(), MapError>;

    fn create_map(&self, center: LatLng, zoom: u8) -> Result<MapHandle, MapError>;

    fn create_marker(&self, map: MapHandle, spec: MarkerSpec) -> MarkerHandle;

    fn remove_marker(&self, marker: MarkerHandle);

    fn create_info_overlay(&self, map: MapHandle, content: OverlayContent) -> OverlayHandle;

    fn open_info_overlay(&self, overlay: OverlayHandle, anchor: MarkerHandle);

    fn close_info_overlay(&self, overlay: OverlayHandle);

    fn remove_info_overlay(&self, overlay: OverlayHandle);

    async fn compute_route(&self, request: RouteRequest) -> Result<Route, MapError>;

    fn create_directions_renderer(&self, map: MapHandle, color: &str) -> RendererHandle;

    fn display_route(&self, renderer: RendererHandle, route: &Route);

    /// Detach from the map and drop the renderer
    fn detach_renderer(&self, renderer: RendererHandle);

    fn fit_bounds(&self, map: MapHandle, bounds: Rect<f64>, padding_px: u32);
}
