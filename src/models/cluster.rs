// src/models/cluster.rs
// DOCUMENTATION: Display clusters produced by the cluster builder
// PURPOSE: One map element per grid cell, with the listings it stands for

use chrono::{DateTime, Utc};
use geo_types::Rect;
use serde::Serialize;
use std::fmt;

use super::{JitteredCoordinate, LatLng, ListingDisplay};

/// Grid cell index: coordinates divided by the grid step, rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClusterKey {
    pub lat_cell: i64,
    pub lng_cell: i64,
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lat_cell, self.lng_cell)
    }
}

/// One listing inside a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMember {
    pub coordinate: JitteredCoordinate,
    pub created_at: DateTime<Utc>,
    pub display: ListingDisplay,
}

impl ClusterMember {
    pub fn listing_id(&self) -> &str {
        &self.coordinate.listing_id
    }

    pub fn label(&self) -> &str {
        if self.display.title.trim().is_empty() {
            &self.coordinate.listing_id
        } else {
            &self.display.title
        }
    }
}

/// Invariant: at least one member, every member snaps to `key`,
/// members ordered by creation time (oldest first)
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub key: ClusterKey,
    pub centroid_lat: f64,
    pub centroid_lng: f64,
    pub members: Vec<ClusterMember>,
}

impl Cluster {
    pub fn centroid(&self) -> LatLng {
        LatLng::new(self.centroid_lat, self.centroid_lng)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }

    pub fn listing_ids(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| m.listing_id().to_string())
            .collect()
    }
}

/// Output of one clustering pass
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterLayout {
    pub clusters: Vec<Cluster>,
    /// Covers every member and the user's position; None when both are absent
    pub bounds: Option<Rect<f64>>,
}

impl ClusterLayout {
    pub fn listing_count(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }
}
