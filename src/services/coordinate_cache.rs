// src/services/coordinate_cache.rs
// DOCUMENTATION: Per-widget store of jittered listing positions
// PURPOSE: The marker and the route to that marker read the same value

use crate::models::JitteredCoordinate;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// listing id → jittered coordinate
/// DOCUMENTATION: Append-only while the widget is visible: an entry, once
/// inserted, is never replaced. Cleared when the widget is hidden.
#[derive(Default)]
pub struct CoordinateCache {
    store: RwLock<HashMap<String, JitteredCoordinate>>,
}

impl CoordinateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, listing_id: &str) -> Option<JitteredCoordinate> {
        self.store.read().await.get(listing_id).cloned()
    }

    pub async fn contains(&self, listing_id: &str) -> bool {
        self.store.read().await.contains_key(listing_id)
    }

    /// Insert unless an entry exists; returns whichever value is now stored
    pub async fn insert_if_absent(&self, coordinate: JitteredCoordinate) -> JitteredCoordinate {
        let mut store = self.store.write().await;
        store
            .entry(coordinate.listing_id.clone())
            .or_insert(coordinate)
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let count = store.len();
        store.clear();
        log::debug!("Coordinate cache cleared: {} entries removed", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoordinateSource;

    fn coordinate(id: &str, lat: f64) -> JitteredCoordinate {
        JitteredCoordinate {
            listing_id: id.to_string(),
            lat,
            lng: 8.0,
            offset_lat: 0.0,
            offset_lng: 0.0,
            source: CoordinateSource::Direct,
        }
    }

    #[tokio::test]
    async fn test_first_insert_wins() {
        let cache = CoordinateCache::new();

        let stored = cache.insert_if_absent(coordinate("svc1", 47.0)).await;
        assert_eq!(stored.lat, 47.0);

        let stored = cache.insert_if_absent(coordinate("svc1", 48.0)).await;
        assert_eq!(stored.lat, 47.0);
        assert_eq!(cache.get("svc1").await.map(|c| c.lat), Some(47.0));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = CoordinateCache::new();
        cache.insert_if_absent(coordinate("svc1", 47.0)).await;
        assert!(cache.contains("svc1").await);

        cache.clear().await;
        assert!(cache.is_empty().await);
        assert!(cache.get("svc1").await.is_none());
    }
}
