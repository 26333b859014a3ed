// src/services/directions.rs
// DOCUMENTATION: Route between the user and a selected listing
// PURPOSE: Single-flight route requests, at most one route on the map

use crate::models::{LatLng, ListingLocationInput};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{
    apply_jitter, listing_hash, CoordinateCache, CoordinateResolver, MapHandle, MapProvider,
    RendererHandle, RouteRequest,
};

/// Viewport padding around a displayed route
pub const DEFAULT_ROUTE_PADDING_PX: u32 = 50;

const ROUTE_COLORS: [&str; 8] = [
    "#2563eb", "#16a34a", "#9333ea", "#db2777", "#ea580c", "#0891b2", "#ca8a04", "#4f46e5",
];

/// Route color for a listing; same listing, same color
pub fn route_color_token(listing_id: &str) -> &'static str {
    let index = listing_hash(listing_id).unsigned_abs() as usize % ROUTE_COLORS.len();
    ROUTE_COLORS[index]
}

/// The route currently drawn on the map
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsSession {
    pub target_listing_id: String,
    pub renderer: RendererHandle,
    pub color_token: String,
    pub destination: LatLng,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Result of one "show route" request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Displayed(DirectionsSession),
    /// Another request is in flight; this one was dropped
    Rejected,
    RoutingUnavailable,
    /// The user's position is unknown
    NoOrigin,
    NoDestination,
    /// Provider answered with an error; the map was left without a route
    Failed(String),
    /// `clear` ran while the request was in flight; its answer was dropped
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Gate {
    Idle,
    Calculating { target_listing_id: String },
}

/// Proof that this caller moved the gate to Calculating.
/// Dropping it is the only way back to Idle.
struct InFlight<'a> {
    gate: &'a Mutex<Gate>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.gate.lock() = Gate::Idle;
    }
}

/// Everything a route request needs from the owning widget
pub struct RouteContext<'a> {
    pub provider: &'a dyn MapProvider,
    pub map: MapHandle,
    pub origin: Option<LatLng>,
    pub routing_available: bool,
    pub cache: &'a CoordinateCache,
    pub resolver: &'a CoordinateResolver,
    pub jitter_amplitude: f64,
}

pub struct DirectionsOrchestrator {
    gate: Mutex<Gate>,
    session: Mutex<Option<DirectionsSession>>,
    /// Bumped by `clear`; requests started under an older epoch are discarded
    epoch: AtomicU64,
    padding_px: u32,
}

impl Default for DirectionsOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_PADDING_PX)
    }
}

impl DirectionsOrchestrator {
    pub fn new(padding_px: u32) -> Self {
        Self {
            gate: Mutex::new(Gate::Idle),
            session: Mutex::new(None),
            epoch: AtomicU64::new(0),
            padding_px,
        }
    }

    pub fn is_calculating(&self) -> bool {
        matches!(*self.gate.lock(), Gate::Calculating { .. })
    }

    pub fn current_session(&self) -> Option<DirectionsSession> {
        self.session.lock().clone()
    }

    fn begin(&self, listing_id: &str) -> Option<InFlight<'_>> {
        let mut gate = self.gate.lock();
        if let Gate::Calculating { target_listing_id } = &*gate {
            log::debug!(
                "Route to {} rejected, route to {} still calculating",
                listing_id,
                target_listing_id
            );
            return None;
        }

        *gate = Gate::Calculating {
            target_listing_id: listing_id.to_string(),
        };
        Some(InFlight { gate: &self.gate })
    }

    /// Show the route from the user to `listing`
    ///
    /// The destination is the listing's cached marker position; it is only
    /// resolved (and cached) here when the listing was never rendered.
    pub async fn show_route(
        &self,
        ctx: &RouteContext<'_>,
        listing: &ListingLocationInput,
    ) -> RouteOutcome {
        if !ctx.routing_available {
            log::debug!("Directions requested but routing library is unavailable");
            return RouteOutcome::RoutingUnavailable;
        }
        let Some(origin) = ctx.origin else {
            return RouteOutcome::NoOrigin;
        };
        let Some(in_flight) = self.begin(&listing.id) else {
            return RouteOutcome::Rejected;
        };
        let epoch = self.epoch.load(Ordering::SeqCst);

        let destination = match ctx.cache.get(&listing.id).await {
            Some(cached) => Some(cached),
            None => match ctx.resolver.resolve(listing).await {
                Some(_) if self.is_stale(epoch) => return RouteOutcome::Superseded,
                Some(resolved) => Some(
                    ctx.cache
                        .insert_if_absent(apply_jitter(resolved, ctx.jitter_amplitude))
                        .await,
                ),
                None => None,
            },
        };
        let Some(destination) = destination else {
            log::info!("No location for listing {}, route not requested", listing.id);
            return RouteOutcome::NoDestination;
        };
        let destination = destination.position();

        if self.is_stale(epoch) {
            return RouteOutcome::Superseded;
        }
        self.detach_session(ctx.provider);

        let result = ctx
            .provider
            .compute_route(RouteRequest::driving(origin, destination))
            .await;
        drop(in_flight);

        if self.is_stale(epoch) {
            log::debug!("Route to {} answered after teardown, dropped", listing.id);
            return RouteOutcome::Superseded;
        }

        match result {
            Ok(route) => {
                let color_token = route_color_token(&listing.id);
                let renderer = ctx.provider.create_directions_renderer(ctx.map, color_token);
                ctx.provider.display_route(renderer, &route);
                ctx.provider.fit_bounds(ctx.map, route.bounds, self.padding_px);

                let session = DirectionsSession {
                    target_listing_id: listing.id.clone(),
                    renderer,
                    color_token: color_token.to_string(),
                    destination,
                    distance_meters: route.distance_meters,
                    duration_seconds: route.duration_seconds,
                };

                // at most one renderer stays attached
                if let Some(previous) = self.session.lock().replace(session.clone()) {
                    ctx.provider.detach_renderer(previous.renderer);
                }

                log::info!(
                    "Route to {} displayed ({:.0} m)",
                    listing.id,
                    session.distance_meters
                );
                RouteOutcome::Displayed(session)
            }
            Err(e) => {
                log::warn!("Route to {} failed: {}", listing.id, e);
                self.session.lock().take();
                RouteOutcome::Failed(e.to_string())
            }
        }
    }

    /// Detach the current route, if any, and drop the answer of any request
    /// still in flight
    pub fn clear(&self, provider: &dyn MapProvider) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.detach_session(provider);
    }

    fn detach_session(&self, provider: &dyn MapProvider) {
        if let Some(session) = self.session.lock().take() {
            provider.detach_renderer(session.renderer);
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }
}
