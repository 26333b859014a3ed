// src/services/widget.rs
// DOCUMENTATION: The map widget state object
// PURPOSE: Owns the handles of one visible map (bootstrap, overlays, cache,
//          directions) and drives resolve -> jitter -> cluster -> render

use crate::errors::MapError;
use crate::models::{ClusterLayout, ClusterMember, LatLng, ListingLocationInput};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    apply_jitter, BootstrapState, ClusterBuilder, CoordinateCache, CoordinateResolver,
    DirectionsOrchestrator, Geocoder, MapBootstrap, MapEvent, MapProvider, Notifier,
    OverlayHandle, OverlayManager, RouteContext, RouteOutcome, DEFAULT_BOOTSTRAP_TIMEOUT,
    DEFAULT_GRID_STEP, DEFAULT_JITTER_AMPLITUDE, DEFAULT_ROUTE_PADDING_PX,
};

const MISSING_KEY_MESSAGE: &str = "The map is not available right now: the map provider is not configured.";

/// Per-process widget configuration, see `Config::widget_settings`
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSettings {
    pub provider_api_key: String,
    pub bootstrap_timeout: Duration,
    pub provider_deep_link_base: String,
    pub default_center: LatLng,
    pub default_zoom: u8,
    pub grid_step: f64,
    pub jitter_amplitude: f64,
    pub fit_padding_px: u32,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            provider_api_key: String::new(),
            bootstrap_timeout: DEFAULT_BOOTSTRAP_TIMEOUT,
            provider_deep_link_base: "https://www.google.com/maps/search/".to_string(),
            default_center: LatLng::new(47.3769, 8.5417),
            default_zoom: 13,
            grid_step: DEFAULT_GRID_STEP,
            jitter_amplitude: DEFAULT_JITTER_AMPLITUDE,
            fit_padding_px: DEFAULT_ROUTE_PADDING_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered { layout: ClusterLayout, markers: usize },
    /// A newer pass (or teardown) started while this one was resolving
    Superseded,
    /// Map not Ready; nothing was drawn
    NotReady,
}

pub struct MapWidget {
    settings: WidgetSettings,
    provider: Arc<dyn MapProvider>,
    resolver: CoordinateResolver,
    notifier: Arc<dyn Notifier>,
    bootstrap: MapBootstrap,
    cache: CoordinateCache,
    builder: ClusterBuilder,
    overlays: Mutex<OverlayManager>,
    directions: DirectionsOrchestrator,
    generation: AtomicU64,
    /// Bumped only by `hide`; passes from an older session must not touch the cache
    session: AtomicU64,
    listings: Mutex<HashMap<String, ListingLocationInput>>,
    user: Mutex<Option<LatLng>>,
}

impl MapWidget {
    pub fn new(
        settings: WidgetSettings,
        provider: Arc<dyn MapProvider>,
        geocoder: Arc<dyn Geocoder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bootstrap: MapBootstrap::new(
                settings.bootstrap_timeout,
                settings.provider_deep_link_base.clone(),
            ),
            builder: ClusterBuilder::new(settings.grid_step),
            directions: DirectionsOrchestrator::new(settings.fit_padding_px),
            resolver: CoordinateResolver::new(geocoder),
            cache: CoordinateCache::new(),
            overlays: Mutex::new(OverlayManager::new()),
            generation: AtomicU64::new(0),
            session: AtomicU64::new(0),
            listings: Mutex::new(HashMap::new()),
            user: Mutex::new(None),
            settings,
            provider,
            notifier,
        }
    }

    pub fn settings(&self) -> &WidgetSettings {
        &self.settings
    }

    pub fn bootstrap_state(&self) -> BootstrapState {
        self.bootstrap.state()
    }

    pub fn coordinate_cache(&self) -> &CoordinateCache {
        &self.cache
    }

    pub fn directions(&self) -> &DirectionsOrchestrator {
        &self.directions
    }

    pub fn active_overlay(&self) -> Option<OverlayHandle> {
        self.overlays.lock().active_overlay()
    }

    pub fn user_position(&self) -> Option<LatLng> {
        *self.user.lock()
    }

    /// Widget became visible: check configuration and bootstrap the map
    ///
    /// The map is centred on the user, or on the configured default center
    /// when the user's position is unknown.
    pub async fn show(&self, user: Option<LatLng>) -> Result<BootstrapState, MapError> {
        if self.provider.requires_api_key() && self.settings.provider_api_key.trim().is_empty() {
            self.notifier.notify_error(MISSING_KEY_MESSAGE);
            return Err(MapError::MissingConfiguration(
                "MAP_PROVIDER_API_KEY".to_string(),
            ));
        }

        if user.is_some() {
            *self.user.lock() = user;
        }
        let center = user.unwrap_or(self.settings.default_center);

        Ok(self
            .bootstrap
            .start(self.provider.as_ref(), center, self.settings.default_zoom)
            .await)
    }

    /// Resolve, jitter, cluster and draw a listing batch
    ///
    /// Listings already in the coordinate cache are not resolved again. A pass
    /// that is overtaken by a newer pass (or by `hide`) while it waits on the
    /// geocoder returns `Superseded` without touching the map. Positions it
    /// resolved are still cached, unless the widget was hidden meanwhile.
    pub async fn render_listings(
        &self,
        listings: Vec<ListingLocationInput>,
        user: Option<LatLng>,
    ) -> RenderOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = self.session.load(Ordering::SeqCst);

        let Some(map) = self.bootstrap.map() else {
            log::debug!("Render pass {} skipped, map is not ready", generation);
            return RenderOutcome::NotReady;
        };

        if user.is_some() {
            *self.user.lock() = user;
        }

        {
            let mut known = self.listings.lock();
            for listing in &listings {
                known.insert(listing.id.clone(), listing.clone());
            }
        }

        let mut pending = Vec::new();
        for listing in &listings {
            if !self.cache.contains(&listing.id).await {
                pending.push(listing.clone());
            }
        }

        for resolved in self.resolver.resolve_batch(&pending).await {
            if self.session.load(Ordering::SeqCst) != session {
                log::debug!("Render pass {} outlived its session, discarding results", generation);
                return RenderOutcome::Superseded;
            }
            self.cache
                .insert_if_absent(apply_jitter(resolved, self.settings.jitter_amplitude))
                .await;
        }

        let mut members = Vec::with_capacity(listings.len());
        for listing in listings {
            if let Some(coordinate) = self.cache.get(&listing.id).await {
                members.push(ClusterMember {
                    coordinate,
                    created_at: listing.created_at,
                    display: listing.display,
                });
            }
        }

        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("Render pass {} superseded, discarding results", generation);
            return RenderOutcome::Superseded;
        }

        let user = self.user_position();
        let layout = self.builder.build(members, user);
        let markers = self
            .overlays
            .lock()
            .render(self.provider.as_ref(), map, &layout.clusters, user);

        if let Some(bounds) = layout.bounds {
            self.provider
                .fit_bounds(map, bounds, self.settings.fit_padding_px);
        }

        log::info!(
            "Render pass {}: {} listings in {} clusters",
            generation,
            layout.listing_count(),
            layout.clusters.len()
        );
        RenderOutcome::Rendered { layout, markers }
    }

    /// Dispatch a provider event. Only directions requests produce an outcome.
    pub async fn handle_event(&self, event: MapEvent) -> Option<RouteOutcome> {
        match event {
            MapEvent::MarkerClicked(marker) => {
                self.overlays
                    .lock()
                    .handle_marker_click(self.provider.as_ref(), marker);
                None
            }
            MapEvent::BackgroundClicked => {
                self.overlays
                    .lock()
                    .handle_background_click(self.provider.as_ref());
                None
            }
            MapEvent::DirectionsRequested { listing_id } => Some(self.show_route(&listing_id).await),
        }
    }

    /// Route from the user to a listing this widget has seen
    pub async fn show_route(&self, listing_id: &str) -> RouteOutcome {
        let Some(map) = self.bootstrap.map() else {
            return RouteOutcome::RoutingUnavailable;
        };
        let Some(listing) = self.listings.lock().get(listing_id).cloned() else {
            log::debug!("Directions requested for unknown listing {}", listing_id);
            return RouteOutcome::NoDestination;
        };

        let ctx = RouteContext {
            provider: self.provider.as_ref(),
            map,
            origin: self.user_position(),
            routing_available: self.bootstrap.routing_available(),
            cache: &self.cache,
            resolver: &self.resolver,
            jitter_amplitude: self.settings.jitter_amplitude,
        };
        self.directions.show_route(&ctx, &listing).await
    }

    /// Widget hidden: drop everything drawn or cached for this session
    pub async fn hide(&self) {
        self.session.fetch_add(1, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);

        self.overlays.lock().dispose(self.provider.as_ref());
        self.directions.clear(self.provider.as_ref());
        self.cache.clear().await;
        self.listings.lock().clear();
        *self.user.lock() = None;
        self.bootstrap.reset();

        log::debug!("Map widget hidden");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::coordinate_resolver::tests::TableGeocoder;
    use crate::services::{HeadlessMapProvider, ScriptLoad};
    use chrono::{Duration as ChronoDuration, Utc};
    use tokio_test::{assert_pending, assert_ready};

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify_error(&self, message: &str) {
            self.messages.lock().push(message.to_string());
        }
    }

    struct Fixture {
        provider: Arc<HeadlessMapProvider>,
        notifier: Arc<RecordingNotifier>,
        widget: MapWidget,
    }

    fn fixture(provider: HeadlessMapProvider) -> Fixture {
        let provider = Arc::new(provider);
        let notifier = Arc::new(RecordingNotifier::default());
        let geocoder = Arc::new(TableGeocoder::new(&[("Bahnhofstrasse 1", 47.3717, 8.5390)]));
        let widget = MapWidget::new(
            WidgetSettings::default(),
            provider.clone(),
            geocoder,
            notifier.clone(),
        );
        Fixture {
            provider,
            notifier,
            widget,
        }
    }

    fn user() -> LatLng {
        LatLng::new(47.36, 8.53)
    }

    fn listing(id: &str, lat: f64, lng: f64, age_minutes: i64) -> ListingLocationInput {
        ListingLocationInput::new(id, Utc::now() - ChronoDuration::minutes(age_minutes))
            .with_location(lat, lng)
            .with_title(&format!("Service {}", id))
    }

    #[tokio::test]
    async fn test_nearby_listings_share_a_cluster() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(Some(user())).await.unwrap();

        let outcome = f
            .widget
            .render_listings(
                vec![
                    listing("svc1", 47.37, 8.54, 10),
                    listing("svc2", 47.3701, 8.5401, 5),
                ],
                None,
            )
            .await;

        let RenderOutcome::Rendered { layout, markers } = outcome else {
            panic!("expected a rendered layout, got {:?}", outcome);
        };
        assert_eq!(layout.clusters.len(), 1);
        assert_eq!(layout.clusters[0].listing_ids(), vec!["svc1", "svc2"]);
        // cluster marker + user marker
        assert_eq!(markers, 2);
        assert_eq!(f.provider.marker_count(), 2);

        let a = f.widget.coordinate_cache().get("svc1").await.unwrap();
        let b = f.widget.coordinate_cache().get("svc2").await.unwrap();
        let cluster = &layout.clusters[0];
        assert!((cluster.centroid_lat - (a.lat + b.lat) / 2.0).abs() < 1e-12);
        assert!((cluster.centroid_lng - (a.lng + b.lng) / 2.0).abs() < 1e-12);
        assert!(f.provider.viewport().is_some());
    }

    #[tokio::test]
    async fn test_route_ends_at_marker_coordinate() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(Some(user())).await.unwrap();
        f.widget
            .render_listings(vec![listing("svc1", 47.37, 8.54, 1)], None)
            .await;

        let marker = f.widget.coordinate_cache().get("svc1").await.unwrap();
        let outcome = f
            .widget
            .handle_event(MapEvent::DirectionsRequested {
                listing_id: "svc1".to_string(),
            })
            .await;

        let Some(RouteOutcome::Displayed(session)) = outcome else {
            panic!("expected a displayed route, got {:?}", outcome);
        };
        assert_eq!(session.destination, marker.position());
        assert_eq!(f.provider.route_requests()[0].origin, user());
    }

    #[tokio::test]
    async fn test_cached_coordinates_survive_rerender() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(None).await.unwrap();

        let svc = ListingLocationInput::new("svc3", Utc::now()).with_address("Bahnhofstrasse 1");
        f.widget.render_listings(vec![svc.clone()], None).await;
        let first = f.widget.coordinate_cache().get("svc3").await.unwrap();

        f.widget.render_listings(vec![svc], None).await;
        let second = f.widget.coordinate_cache().get("svc3").await.unwrap();

        assert_eq!(first, second);
        // no user position: one marker, no "You are here"
        assert_eq!(f.provider.marker_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_render_pass_is_discarded() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(Some(user())).await.unwrap();

        let slow = ListingLocationInput::new("slow", Utc::now()).with_address("Bahnhofstrasse 1");
        let mut stale = tokio_test::task::spawn(f.widget.render_listings(vec![slow], None));
        assert_pending!(stale.poll());

        let fresh = f
            .widget
            .render_listings(vec![listing("fresh", 47.40, 8.60, 1)], None)
            .await;
        assert!(matches!(fresh, RenderOutcome::Rendered { .. }));

        assert_eq!(assert_ready!(stale.poll()), RenderOutcome::Superseded);

        // map still shows the newer pass: one listing marker + the user
        let titles: Vec<String> = f.provider.markers().into_iter().map(|(_, s)| s.title).collect();
        assert_eq!(f.provider.marker_count(), 2);
        assert!(titles.contains(&"Service fresh".to_string()));
        // the geocoded position is kept for later passes
        assert!(f.widget.coordinate_cache().contains("slow").await);
    }

    #[tokio::test]
    async fn test_hide_discards_pending_render_pass() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(Some(user())).await.unwrap();

        let slow = ListingLocationInput::new("slow", Utc::now()).with_address("Bahnhofstrasse 1");
        let mut pass = tokio_test::task::spawn(f.widget.render_listings(vec![slow], None));
        assert_pending!(pass.poll());

        f.widget.hide().await;

        assert_eq!(assert_ready!(pass.poll()), RenderOutcome::Superseded);
        assert!(f.widget.coordinate_cache().is_empty().await);
        assert_eq!(f.provider.marker_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_drops_route_in_flight() {
        let latency = Duration::from_secs(2);
        let f = fixture(HeadlessMapProvider::new().with_route_latency(latency));
        f.widget.show(Some(user())).await.unwrap();
        f.widget
            .render_listings(vec![listing("svc1", 47.37, 8.54, 1)], None)
            .await;

        let mut route = tokio_test::task::spawn(f.widget.show_route("svc1"));
        assert_pending!(route.poll());

        f.widget.hide().await;
        tokio::time::advance(latency).await;

        assert_eq!(assert_ready!(route.poll()), RouteOutcome::Superseded);
        assert!(f.provider.attached_renderers().is_empty());
        assert!(f.widget.directions().current_session().is_none());
        assert!(!f.widget.directions().is_calculating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_script_renders_nothing() {
        let f = fixture(HeadlessMapProvider::new().with_script_load(ScriptLoad::Never));

        let state = f.widget.show(Some(user())).await.unwrap();
        let BootstrapState::Failed(failure) = state else {
            panic!("expected Failed, got {:?}", state);
        };
        assert!(!failure.message.is_empty());

        let outcome = f
            .widget
            .render_listings(vec![listing("svc1", 47.37, 8.54, 1)], None)
            .await;
        assert_eq!(outcome, RenderOutcome::NotReady);
        assert_eq!(f.provider.marker_count(), 0);
        assert_eq!(
            f.widget.show_route("svc1").await,
            RouteOutcome::RoutingUnavailable
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_notifies_once() {
        let f = fixture(HeadlessMapProvider::new().with_api_key_required(true));

        let result = f.widget.show(Some(user())).await;

        assert!(matches!(result, Err(MapError::MissingConfiguration(_))));
        assert_eq!(f.notifier.messages.lock().len(), 1);
        assert_eq!(f.widget.bootstrap_state(), BootstrapState::NotStarted);
        assert_eq!(f.provider.map_count(), 0);
    }

    #[tokio::test]
    async fn test_degraded_routing_still_renders_markers() {
        let f = fixture(HeadlessMapProvider::new().with_routing_library(false));
        f.widget.show(Some(user())).await.unwrap();

        let outcome = f
            .widget
            .render_listings(vec![listing("svc1", 47.37, 8.54, 1)], None)
            .await;

        assert!(matches!(outcome, RenderOutcome::Rendered { .. }));
        assert_eq!(
            f.widget.show_route("svc1").await,
            RouteOutcome::RoutingUnavailable
        );
        assert!(f.provider.route_requests().is_empty());
    }

    #[tokio::test]
    async fn test_marker_clicks_keep_one_overlay_open() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(Some(user())).await.unwrap();
        f.widget
            .render_listings(
                vec![listing("a", 47.30, 8.40, 2), listing("b", 47.50, 8.70, 1)],
                None,
            )
            .await;

        let markers: Vec<_> = f
            .provider
            .markers()
            .into_iter()
            .filter(|(_, spec)| spec.cluster.is_some())
            .map(|(handle, _)| handle)
            .collect();
        assert_eq!(markers.len(), 2);

        f.widget.handle_event(MapEvent::MarkerClicked(markers[0])).await;
        f.widget.handle_event(MapEvent::MarkerClicked(markers[1])).await;
        assert_eq!(f.provider.open_overlays().len(), 1);
        assert_eq!(f.widget.active_overlay(), f.provider.open_overlays().first().copied());

        f.widget.handle_event(MapEvent::BackgroundClicked).await;
        assert!(f.provider.open_overlays().is_empty());
    }

    #[tokio::test]
    async fn test_directions_need_user_position() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(None).await.unwrap();
        f.widget
            .render_listings(vec![listing("svc1", 47.37, 8.54, 1)], None)
            .await;

        assert_eq!(f.widget.show_route("svc1").await, RouteOutcome::NoOrigin);
        assert_eq!(f.widget.show_route("unknown").await, RouteOutcome::NoDestination);
    }

    #[tokio::test]
    async fn test_hide_tears_down_session() {
        let f = fixture(HeadlessMapProvider::new());
        f.widget.show(Some(user())).await.unwrap();
        f.widget
            .render_listings(vec![listing("svc1", 47.37, 8.54, 1)], None)
            .await;
        f.widget.show_route("svc1").await;
        assert_eq!(f.provider.attached_renderers().len(), 1);

        f.widget.hide().await;

        assert_eq!(f.provider.marker_count(), 0);
        assert_eq!(f.provider.overlay_count(), 0);
        assert!(f.provider.attached_renderers().is_empty());
        assert!(f.widget.coordinate_cache().is_empty().await);
        assert!(f.widget.user_position().is_none());
        assert_eq!(f.widget.bootstrap_state(), BootstrapState::NotStarted);

        // next visible session reuses the already injected script
        let state = f.widget.show(Some(user())).await.unwrap();
        assert!(matches!(state, BootstrapState::Ready { .. }));
        assert_eq!(f.provider.map_count(), 2);
    }
}
