// src/services/cluster_builder.rs
// DOCUMENTATION: Grid clustering of jittered listing positions
// PURPOSE: Merge listings that would overlap on screen into one map element

use crate::models::{Cluster, ClusterKey, ClusterLayout, ClusterMember, LatLng};
use geo_types::{Coord, Rect};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use std::collections::BTreeMap;

/// Grid step in degrees; groups listings within roughly 500-800 m
pub const DEFAULT_GRID_STEP: f64 = 0.008;

/// Grid clustering service
/// DOCUMENTATION: Snaps every coordinate to a fixed-size cell and treats
/// each occupied cell as one cluster. The centroid is the mean of the
/// members, not the cell center, so single markers stay where they belong.
pub struct ClusterBuilder {
    grid_step: f64,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_STEP)
    }
}

impl ClusterBuilder {
    pub fn new(grid_step: f64) -> Self {
        Self { grid_step }
    }

    pub fn grid_step(&self) -> f64 {
        self.grid_step
    }

    pub fn grid_key(&self, position: LatLng) -> ClusterKey {
        ClusterKey {
            lat_cell: (position.lat / self.grid_step).round() as i64,
            lng_cell: (position.lng / self.grid_step).round() as i64,
        }
    }

    /// Build clusters for one listing batch
    ///
    /// # Arguments
    /// * `members` - jittered listings of the batch, any order
    /// * `user` - the user's position, only used for the bounding region
    ///
    /// # Returns
    /// Clusters ordered by key, members oldest first (ties by listing id)
    pub fn build(&self, members: Vec<ClusterMember>, user: Option<LatLng>) -> ClusterLayout {
        let member_count = members.len();
        let mut cells: BTreeMap<ClusterKey, Vec<ClusterMember>> = BTreeMap::new();

        for member in members {
            let key = self.grid_key(member.coordinate.position());
            cells.entry(key).or_default().push(member);
        }

        let clusters: Vec<Cluster> = cells
            .into_iter()
            .map(|(key, mut members)| {
                members.sort_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.listing_id().cmp(b.listing_id()))
                });

                let count = members.len() as f64;
                let centroid_lat = members.iter().map(|m| m.coordinate.lat).sum::<f64>() / count;
                let centroid_lng = members.iter().map(|m| m.coordinate.lng).sum::<f64>() / count;

                Cluster {
                    key,
                    centroid_lat,
                    centroid_lng,
                    members,
                }
            })
            .collect();

        log::debug!(
            "Built {} clusters from {} listings (grid step {}°)",
            clusters.len(),
            member_count,
            self.grid_step
        );

        let bounds = layout_bounds(&clusters, user);
        ClusterLayout { clusters, bounds }
    }
}

/// Smallest rectangle containing every member and the user
pub fn layout_bounds(clusters: &[Cluster], user: Option<LatLng>) -> Option<Rect<f64>> {
    let points = clusters
        .iter()
        .flat_map(|c| c.members.iter().map(|m| m.coordinate.position()))
        .chain(user);

    let mut extent: Option<(Coord<f64>, Coord<f64>)> = None;
    for point in points {
        let c = point.to_coord();
        extent = Some(match extent {
            None => (c, c),
            Some((min, max)) => (
                Coord {
                    x: min.x.min(c.x),
                    y: min.y.min(c.y),
                },
                Coord {
                    x: max.x.max(c.x),
                    y: max.y.max(c.y),
                },
            ),
        });
    }

    extent.map(|(min, max)| Rect::new(min, max))
}

/// GeoJSON view of a layout: one Point feature per cluster, at its centroid
pub fn to_feature_collection(layout: &ClusterLayout) -> FeatureCollection {
    let features = layout
        .clusters
        .iter()
        .map(|cluster| {
            let mut properties = JsonObject::new();
            properties.insert("key".to_string(), json!(cluster.key.to_string()));
            properties.insert("count".to_string(), json!(cluster.len()));
            properties.insert("listing_ids".to_string(), json!(cluster.listing_ids()));

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    cluster.centroid_lng,
                    cluster.centroid_lat,
                ]))),
                id: Some(Id::String(cluster.key.to_string())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
