// src/services/headless_provider.rs
// DOCUMENTATION: In-process MapProvider that keeps the map as plain data
// PURPOSE: Server-side previews and offline runs; load and routing behaviour
//          can be scripted to reproduce slow or blocked provider CDNs

use crate::errors::MapError;
use crate::models::LatLng;
use async_trait::async_trait;
use geo_types::Rect;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{
    MapHandle, MapProvider, MarkerHandle, MarkerSpec, OverlayContent, OverlayHandle,
    RendererHandle, Route, RouteRequest,
};

/// Average urban driving speed used for headless route durations
const HEADLESS_SPEED_MPS: f64 = 11.0;

/// What happens when a provider script is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLoad {
    Immediate,
    /// Script tag fires its error event
    Fails,
    /// Request never settles (blocked by an extension, dead CDN)
    Never,
}

#[derive(Debug, Default)]
struct RendererState {
    color: String,
    route: Option<Route>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    maps: Vec<MapHandle>,
    markers: HashMap<MarkerHandle, MarkerSpec>,
    overlays: HashMap<OverlayHandle, OverlayContent>,
    open_overlays: HashSet<OverlayHandle>,
    renderers: HashMap<RendererHandle, RendererState>,
    route_requests: Vec<RouteRequest>,
    viewport: Option<(Rect<f64>, u32)>,
}

pub struct HeadlessMapProvider {
    requires_key: bool,
    script_present: AtomicBool,
    script_load: ScriptLoad,
    routing_loaded: AtomicBool,
    routing_load: ScriptLoad,
    route_latency: Duration,
    fail_routes: bool,
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessMapProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessMapProvider {
    /// Script and routing library load instantly, routes always succeed
    pub fn new() -> Self {
        Self {
            requires_key: false,
            script_present: AtomicBool::new(false),
            script_load: ScriptLoad::Immediate,
            routing_loaded: AtomicBool::new(false),
            routing_load: ScriptLoad::Immediate,
            route_latency: Duration::ZERO,
            fail_routes: false,
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Refuse to activate without an API key, like the hosted adapter
    pub fn with_api_key_required(mut self, required: bool) -> Self {
        self.requires_key = required;
        self
    }

    /// Pretend a previous mount already injected the script
    pub fn with_script_present(self, present: bool) -> Self {
        self.script_present.store(present, Ordering::SeqCst);
        self
    }

    pub fn with_script_load(mut self, behaviour: ScriptLoad) -> Self {
        self.script_load = behaviour;
        self
    }

    pub fn with_routing_library(self, loads: bool) -> Self {
        self.with_routing_load(if loads {
            ScriptLoad::Immediate
        } else {
            ScriptLoad::Fails
        })
    }

    pub fn with_routing_load(mut self, behaviour: ScriptLoad) -> Self {
        self.routing_load = behaviour;
        self
    }

    pub fn with_route_latency(mut self, latency: Duration) -> Self {
        self.route_latency = latency;
        self
    }

    /// Every route request answers ZERO_RESULTS
    pub fn with_failing_routes(mut self, fail: bool) -> Self {
        self.fail_routes = fail;
        self
    }

    pub fn map_count(&self) -> usize {
        self.state.lock().maps.len()
    }

    pub fn marker_count(&self) -> usize {
        self.state.lock().markers.len()
    }

    pub fn markers(&self) -> Vec<(MarkerHandle, MarkerSpec)> {
        self.state
            .lock()
            .markers
            .iter()
            .map(|(handle, spec)| (*handle, spec.clone()))
            .collect()
    }

    pub fn overlay_count(&self) -> usize {
        self.state.lock().overlays.len()
    }

    pub fn open_overlays(&self) -> Vec<OverlayHandle> {
        self.state.lock().open_overlays.iter().copied().collect()
    }

    pub fn overlay_content(&self, overlay: OverlayHandle) -> Option<OverlayContent> {
        self.state.lock().overlays.get(&overlay).cloned()
    }

    /// Renderers currently attached to a map
    pub fn attached_renderers(&self) -> Vec<RendererHandle> {
        self.state.lock().renderers.keys().copied().collect()
    }

    pub fn renderer_color(&self, renderer: RendererHandle) -> Option<String> {
        self.state
            .lock()
            .renderers
            .get(&renderer)
            .map(|r| r.color.clone())
    }

    pub fn displayed_route(&self, renderer: RendererHandle) -> Option<Route> {
        self.state
            .lock()
            .renderers
            .get(&renderer)
            .and_then(|r| r.route.clone())
    }

    pub fn route_requests(&self) -> Vec<RouteRequest> {
        self.state.lock().route_requests.clone()
    }

    pub fn viewport(&self) -> Option<(Rect<f64>, u32)> {
        self.state.lock().viewport
    }

    fn straight_route(request: &RouteRequest) -> Route {
        let distance_meters = request.origin.distance_meters(&request.destination);

        Route {
            path: vec![request.origin, request.destination],
            bounds: Rect::new(request.origin.to_coord(), request.destination.to_coord()),
            distance_meters,
            duration_seconds: distance_meters / HEADLESS_SPEED_MPS,
        }
    }
}

#[async_trait]
impl MapProvider for HeadlessMapProvider {
    fn requires_api_key(&self) -> bool {
        self.requires_key
    }

    fn is_loaded(&self) -> bool {
        self.script_present.load(Ordering::SeqCst)
    }

    async fn ensure_loaded(&self) -> Result<(), MapError> {
        match self.script_load {
            ScriptLoad::Immediate => {
                self.script_present.store(true, Ordering::SeqCst);
                Ok(())
            }
            ScriptLoad::Fails => Err(MapError::ProviderLoadFailed(
                "script error event".to_string(),
            )),
            ScriptLoad::Never => std::future::pending::<Result<(), MapError>>().await,
        }
    }

    fn is_routing_loaded(&self) -> bool {
        self.routing_loaded.load(Ordering::SeqCst)
    }

    async fn ensure_routing_loaded(&self) -> Result<(), MapError> {
        match self.routing_load {
            ScriptLoad::Immediate => {
                self.routing_loaded.store(true, Ordering::SeqCst);
                Ok(())
            }
            ScriptLoad::Fails => Err(MapError::RoutingUnavailable),
            ScriptLoad::Never => std::future::pending::<Result<(), MapError>>().await,
        }
    }

    fn create_map(&self, _center: LatLng, _zoom: u8) -> Result<MapHandle, MapError> {
        if !self.is_loaded() {
            return Err(MapError::ProviderLoadFailed("map library not loaded".to_string()));
        }
        let map = MapHandle::new();
        self.state.lock().maps.push(map);
        Ok(map)
    }

    fn create_marker(&self, _map: MapHandle, spec: MarkerSpec) -> MarkerHandle {
        let marker = MarkerHandle::new();
        self.state.lock().markers.insert(marker, spec);
        marker
    }

    fn remove_marker(&self, marker: MarkerHandle) {
        self.state.lock().markers.remove(&marker);
    }

    fn create_info_overlay(&self, _map: MapHandle, content: OverlayContent) -> OverlayHandle {
        let overlay = OverlayHandle::new();
        self.state.lock().overlays.insert(overlay, content);
        overlay
    }

    fn open_info_overlay(&self, overlay: OverlayHandle, _anchor: MarkerHandle) {
        self.state.lock().open_overlays.insert(overlay);
    }

    fn close_info_overlay(&self, overlay: OverlayHandle) {
        self.state.lock().open_overlays.remove(&overlay);
    }

    fn remove_info_overlay(&self, overlay: OverlayHandle) {
        let mut state = self.state.lock();
        state.open_overlays.remove(&overlay);
        state.overlays.remove(&overlay);
    }

    async fn compute_route(&self, request: RouteRequest) -> Result<Route, MapError> {
        self.state.lock().route_requests.push(request.clone());

        if !self.route_latency.is_zero() {
            tokio::time::sleep(self.route_latency).await;
        }

        if self.fail_routes {
            return Err(MapError::RouteFailed("ZERO_RESULTS".to_string()));
        }
        Ok(Self::straight_route(&request))
    }

    fn create_directions_renderer(&self, _map: MapHandle, color: &str) -> RendererHandle {
        let renderer = RendererHandle::new();
        self.state.lock().renderers.insert(
            renderer,
            RendererState {
                color: color.to_string(),
                route: None,
            },
        );
        renderer
    }

    fn display_route(&self, renderer: RendererHandle, route: &Route) {
        if let Some(state) = self.state.lock().renderers.get_mut(&renderer) {
            state.route = Some(route.clone());
        }
    }

    fn detach_renderer(&self, renderer: RendererHandle) {
        self.state.lock().renderers.remove(&renderer);
    }

    fn fit_bounds(&self, _map: MapHandle, bounds: Rect<f64>, padding_px: u32) {
        self.state.lock().viewport = Some((bounds, padding_px));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MarkerStyle;

    #[tokio::test]
    async fn test_map_requires_loaded_script() {
        let provider = HeadlessMapProvider::new();
        assert!(provider.create_map(LatLng::new(0.0, 0.0), 10).is_err());

        provider.ensure_loaded().await.unwrap();
        assert!(provider.is_loaded());
        assert!(provider.create_map(LatLng::new(0.0, 0.0), 10).is_ok());
        assert_eq!(provider.map_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_script() {
        let provider = HeadlessMapProvider::new().with_script_load(ScriptLoad::Fails);
        assert!(provider.ensure_loaded().await.is_err());
        assert!(!provider.is_loaded());
    }

    #[tokio::test]
    async fn test_routing_library_failure() {
        let provider = HeadlessMapProvider::new().with_routing_library(false);
        assert_eq!(
            provider.ensure_routing_loaded().await,
            Err(MapError::RoutingUnavailable)
        );
        assert!(!provider.is_routing_loaded());
    }

    #[tokio::test]
    async fn test_straight_line_route() {
        let provider = HeadlessMapProvider::new();
        let request = RouteRequest::driving(LatLng::new(47.37, 8.54), LatLng::new(47.38, 8.55));

        let route = provider.compute_route(request.clone()).await.unwrap();
        assert_eq!(route.path, vec![request.origin, request.destination]);
        assert!(route.distance_meters > 1000.0);
        assert_eq!(provider.route_requests(), vec![request]);
    }

    #[test]
    fn test_marker_bookkeeping() {
        let provider = HeadlessMapProvider::new().with_script_present(true);
        let map = provider.create_map(LatLng::new(0.0, 0.0), 10).unwrap();

        let marker = provider.create_marker(
            map,
            MarkerSpec {
                position: LatLng::new(1.0, 1.0),
                style: MarkerStyle::Single,
                title: "svc".to_string(),
                cluster: None,
            },
        );
        assert_eq!(provider.marker_count(), 1);

        provider.remove_marker(marker);
        assert_eq!(provider.marker_count(), 0);
    }
}
