// src/services/overlay_manager.rs
// DOCUMENTATION: Lifecycle of markers and info overlays on the map
// PURPOSE: Full teardown on every render, exactly one open overlay at a time

use crate::models::{Cluster, ClusterKey, LatLng};

use super::{
    MapHandle, MapProvider, MarkerHandle, MarkerSpec, MarkerStyle, OverlayContent, OverlayHandle,
};

/// What a rendered element stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    User,
    Cluster(ClusterKey),
}

#[derive(Debug, Clone)]
struct RenderedElement {
    marker: MarkerHandle,
    overlay: OverlayHandle,
    kind: ElementKind,
}

/// The widget's OverlaySet
#[derive(Debug, Default)]
pub struct OverlayManager {
    elements: Vec<RenderedElement>,
    active: Option<OverlayHandle>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything on the map with one marker per cluster plus the user marker
    ///
    /// # Returns
    /// Number of markers now on the map
    pub fn render(
        &mut self,
        provider: &dyn MapProvider,
        map: MapHandle,
        clusters: &[Cluster],
        user: Option<LatLng>,
    ) -> usize {
        self.dispose(provider);

        for cluster in clusters {
            let style = if cluster.is_single() {
                MarkerStyle::Single
            } else {
                MarkerStyle::Cluster {
                    count: cluster.len(),
                }
            };
            let content = overlay_content_for(cluster);
            let spec = MarkerSpec {
                position: cluster.centroid(),
                style,
                title: content.heading.clone(),
                cluster: Some(cluster.key),
            };
            self.add_element(provider, map, spec, content, ElementKind::Cluster(cluster.key));
        }

        if let Some(position) = user {
            let spec = MarkerSpec {
                position,
                style: MarkerStyle::User,
                title: "You are here".to_string(),
                cluster: None,
            };
            let content = OverlayContent {
                heading: "You are here".to_string(),
                lines: Vec::new(),
                listing_ids: Vec::new(),
            };
            self.add_element(provider, map, spec, content, ElementKind::User);
        }

        log::debug!("Rendered {} map elements", self.elements.len());
        self.elements.len()
    }

    fn add_element(
        &mut self,
        provider: &dyn MapProvider,
        map: MapHandle,
        spec: MarkerSpec,
        content: OverlayContent,
        kind: ElementKind,
    ) {
        let marker = provider.create_marker(map, spec);
        let overlay = provider.create_info_overlay(map, content);
        self.elements.push(RenderedElement {
            marker,
            overlay,
            kind,
        });
    }

    /// Marker click: close whatever is open, open this marker's overlay.
    /// Returns false for markers this manager does not own (stale events).
    pub fn handle_marker_click(&mut self, provider: &dyn MapProvider, marker: MarkerHandle) -> bool {
        let Some(element) = self.elements.iter().find(|e| e.marker == marker) else {
            log::debug!("Ignoring click on unknown marker {:?}", marker);
            return false;
        };
        let overlay = element.overlay;

        self.close_active(provider);
        provider.open_info_overlay(overlay, marker);
        self.active = Some(overlay);
        true
    }

    /// Click on empty map area
    pub fn handle_background_click(&mut self, provider: &dyn MapProvider) {
        self.close_active(provider);
    }

    fn close_active(&mut self, provider: &dyn MapProvider) {
        if let Some(overlay) = self.active.take() {
            provider.close_info_overlay(overlay);
        }
    }

    /// Remove every marker and overlay. Safe to call repeatedly.
    pub fn dispose(&mut self, provider: &dyn MapProvider) {
        self.close_active(provider);

        for element in self.elements.drain(..) {
            provider.remove_info_overlay(element.overlay);
            provider.remove_marker(element.marker);
        }
    }

    pub fn active_overlay(&self) -> Option<OverlayHandle> {
        self.active
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn marker_for(&self, kind: ElementKind) -> Option<MarkerHandle> {
        self.elements
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.marker)
    }

    pub fn overlay_for(&self, kind: ElementKind) -> Option<OverlayHandle> {
        self.elements
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.overlay)
    }
}

/// Overlay text for a cluster; members keep the cluster's (oldest first) order
pub fn overlay_content_for(cluster: &Cluster) -> OverlayContent {
    if let [member] = cluster.members.as_slice() {
        let mut lines = Vec::new();
        if let Some(category) = &member.display.category {
            lines.push(category.clone());
        }
        if let Some(price) = &member.display.price_label {
            lines.push(price.clone());
        }

        return OverlayContent {
            heading: member.label().to_string(),
            lines,
            listing_ids: vec![member.listing_id().to_string()],
        };
    }

    OverlayContent {
        heading: format!("{} services nearby", cluster.len()),
        lines: cluster.members.iter().map(|m| m.label().to_string()).collect(),
        listing_ids: cluster.listing_ids(),
    }
}
