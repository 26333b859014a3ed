// src/services/bootstrap.rs
// DOCUMENTATION: Loading of the external map and routing libraries
// PURPOSE: NotStarted -> Loading -> Ready | Failed, exposed to the rest of the widget

use crate::errors::MapError;
use crate::models::LatLng;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

use super::{MapHandle, MapProvider};

/// How long the provider script may take before the widget gives up
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);

const BLOCKED_SCRIPT_MESSAGE: &str = "The map could not be loaded. An ad blocker or privacy \
extension may be blocking the map provider; allow it for this site and reload the page, \
or open the location directly on the provider's website.";

const MAP_INIT_MESSAGE: &str = "The map could not be displayed. Open the location directly \
on the provider's website instead.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    ScriptError,
    MapInitialization,
}

/// User-facing description of a failed bootstrap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapFailure {
    pub reason: FailureReason,
    pub message: String,
    /// Opens the same area on the provider's own site
    pub fallback_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapState {
    NotStarted,
    Loading,
    Ready {
        map: MapHandle,
        routing_available: bool,
    },
    Failed(BootstrapFailure),
}

impl BootstrapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapState::Ready { .. } | BootstrapState::Failed(_))
    }
}

/// Provider deep link for a position, e.g. `https://www.google.com/maps/search/?api=1&query=47.37,8.54`
pub fn provider_deep_link(base: &str, center: LatLng) -> String {
    format!("{}?api=1&query={},{}", base, center.lat, center.lng)
}

pub struct MapBootstrap {
    state: Mutex<BootstrapState>,
    timeout: Duration,
    deep_link_base: String,
}

impl MapBootstrap {
    pub fn new(timeout: Duration, deep_link_base: String) -> Self {
        Self {
            state: Mutex::new(BootstrapState::NotStarted),
            timeout,
            deep_link_base,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state.lock().clone()
    }

    pub fn map(&self) -> Option<MapHandle> {
        match *self.state.lock() {
            BootstrapState::Ready { map, .. } => Some(map),
            _ => None,
        }
    }

    pub fn routing_available(&self) -> bool {
        matches!(
            *self.state.lock(),
            BootstrapState::Ready {
                routing_available: true,
                ..
            }
        )
    }

    /// Back to NotStarted for the next visible session
    pub fn reset(&self) {
        *self.state.lock() = BootstrapState::NotStarted;
    }

    /// Run the bootstrap sequence once.
    ///
    /// Only the first call from NotStarted does any work; later calls (or a
    /// call while another is loading) return the current state.
    pub async fn start(&self, provider: &dyn MapProvider, center: LatLng, zoom: u8) -> BootstrapState {
        {
            let mut state = self.state.lock();
            if *state != BootstrapState::NotStarted {
                return state.clone();
            }
            *state = BootstrapState::Loading;
        }

        let next = self.run(provider, center, zoom).await;
        *self.state.lock() = next.clone();
        next
    }

    async fn run(&self, provider: &dyn MapProvider, center: LatLng, zoom: u8) -> BootstrapState {
        if !provider.is_loaded() {
            log::info!("Loading map provider script (timeout {}s)", self.timeout.as_secs());

            match tokio::time::timeout(self.timeout, provider.ensure_loaded()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("Map provider script failed to load: {}", e);
                    return self.failed(FailureReason::ScriptError, center);
                }
                Err(_) => {
                    log::error!("{}", MapError::ProviderTimeout);
                    return self.failed(FailureReason::Timeout, center);
                }
            }
        }

        let routing_available = if provider.is_routing_loaded() {
            true
        } else {
            match tokio::time::timeout(self.timeout, provider.ensure_routing_loaded()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    log::warn!("Routing library unavailable, directions disabled: {}", e);
                    false
                }
                Err(_) => {
                    log::warn!("Routing library did not load in time, directions disabled");
                    false
                }
            }
        };

        match provider.create_map(center, zoom) {
            Ok(map) => {
                log::info!("Map ready (routing available: {})", routing_available);
                BootstrapState::Ready {
                    map,
                    routing_available,
                }
            }
            Err(e) => {
                log::error!("Map initialization failed: {}", e);
                self.failed(FailureReason::MapInitialization, center)
            }
        }
    }

    fn failed(&self, reason: FailureReason, center: LatLng) -> BootstrapState {
        let message = match reason {
            FailureReason::Timeout | FailureReason::ScriptError => BLOCKED_SCRIPT_MESSAGE,
            FailureReason::MapInitialization => MAP_INIT_MESSAGE,
        };

        BootstrapState::Failed(BootstrapFailure {
            reason,
            message: message.to_string(),
            fallback_url: provider_deep_link(&self.deep_link_base, center),
        })
    }
}
