// src/services/coordinate_resolver.rs
// DOCUMENTATION: Fallback chain that places a listing on the map
// PURPOSE: direct coordinates -> geocoded primary address -> owner coordinates

use crate::models::{CoordinateSource, LatLng, ListingLocationInput, ResolvedCoordinate};
use futures::future::join_all;
use std::sync::Arc;

use super::Geocoder;

pub struct CoordinateResolver {
    geocoder: Arc<dyn Geocoder>,
}

impl CoordinateResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Resolve one listing, first successful stage wins.
    ///
    /// None means the listing is left off the map; that is a normal outcome,
    /// not an error.
    pub async fn resolve(&self, listing: &ListingLocationInput) -> Option<ResolvedCoordinate> {
        if let Some(position) = listing.direct_coordinate() {
            return ResolvedCoordinate::new(&listing.id, position, CoordinateSource::Direct);
        }

        if let Some(address) = listing.primary_address() {
            match self.geocoder.geocode(address).await {
                Ok(hit) => {
                    let position = LatLng::new(hit.lat, hit.lng);
                    if let Some(resolved) =
                        ResolvedCoordinate::new(&listing.id, position, CoordinateSource::Geocoded)
                    {
                        return Some(resolved);
                    }
                    log::warn!(
                        "Geocoder returned a non-finite position for listing {}",
                        listing.id
                    );
                }
                Err(e) => {
                    log::warn!("Geocoding failed for listing {}: {}", listing.id, e);
                }
            }
        }

        if let Some(position) = listing.owner_coordinate() {
            return ResolvedCoordinate::new(&listing.id, position, CoordinateSource::OwnerFallback);
        }

        log::debug!("Listing {} has no usable location, skipping", listing.id);
        None
    }

    /// Resolve a whole batch concurrently and wait for every listing.
    /// Output keeps input order and omits unresolved listings.
    pub async fn resolve_batch(&self, listings: &[ListingLocationInput]) -> Vec<ResolvedCoordinate> {
        let resolved: Vec<ResolvedCoordinate> = join_all(listings.iter().map(|l| self.resolve(l)))
            .await
            .into_iter()
            .flatten()
            .collect();

        log::info!(
            "Resolved {}/{} listing locations",
            resolved.len(),
            listings.len()
        );

        resolved
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::MapError;
    use crate::services::GeocodeResult;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    /// Geocoder that answers from a fixed table and records every lookup
    pub(crate) struct TableGeocoder {
        pub entries: Vec<(String, GeocodeResult)>,
        pub calls: Mutex<Vec<String>>,
    }

    impl TableGeocoder {
        pub(crate) fn new(entries: &[(&str, f64, f64)]) -> Self {
            Self {
                entries: entries
                    .iter()
                    .map(|(address, lat, lng)| {
                        (
                            address.to_string(),
                            GeocodeResult {
                                lat: *lat,
                                lng: *lng,
                                display_name: address.to_string(),
                            },
                        )
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Geocoder for TableGeocoder {
        async fn geocode(&self, address: &str) -> Result<GeocodeResult, MapError> {
            self.calls.lock().push(address.to_string());
            tokio::task::yield_now().await;
            self.entries
                .iter()
                .find(|(a, _)| a == address)
                .map(|(_, r)| r.clone())
                .ok_or_else(|| MapError::GeocodingFailed(format!("No result for '{}'", address)))
        }
    }

    fn resolver(geocoder: TableGeocoder) -> CoordinateResolver {
        CoordinateResolver::new(Arc::new(geocoder))
    }

    #[tokio::test]
    async fn test_direct_wins_over_owner() {
        let listing = ListingLocationInput::new("svc1", Utc::now())
            .with_location(47.37, 8.54)
            .with_owner_location(46.0, 7.0);

        let resolved = resolver(TableGeocoder::new(&[])).resolve(&listing).await.unwrap();
        assert_eq!(resolved.source, CoordinateSource::Direct);
        assert_eq!(resolved.position(), LatLng::new(47.37, 8.54));
    }

    #[tokio::test]
    async fn test_geocode_before_owner() {
        let geocoder = TableGeocoder::new(&[("Main St 1", 10.0, 20.0)]);
        let listing = ListingLocationInput::new("svc1", Utc::now())
            .with_address("Main St 1")
            .with_owner_location(1.0, 1.0);

        let resolved = resolver(geocoder).resolve(&listing).await.unwrap();
        assert_eq!(resolved.source, CoordinateSource::Geocoded);
        assert_eq!(resolved.position(), LatLng::new(10.0, 20.0));
    }

    #[tokio::test]
    async fn test_owner_fallback_when_geocoder_fails() {
        let listing = ListingLocationInput::new("svc3", Utc::now())
            .with_address("Nowhere 404")
            .with_owner_location(1.0, 1.0);

        let resolved = resolver(TableGeocoder::new(&[])).resolve(&listing).await.unwrap();
        assert_eq!(resolved.source, CoordinateSource::OwnerFallback);
        assert_eq!(resolved.position(), LatLng::new(1.0, 1.0));
    }

    #[tokio::test]
    async fn test_invalid_direct_falls_through() {
        let mut listing = ListingLocationInput::new("svc4", Utc::now()).with_owner_location(2.0, 3.0);
        listing.location_lat = Some(crate::models::RawCoordinate::Text("n/a".to_string()));
        listing.location_lng = Some(crate::models::RawCoordinate::Number(8.0));

        let resolved = resolver(TableGeocoder::new(&[])).resolve(&listing).await.unwrap();
        assert_eq!(resolved.source, CoordinateSource::OwnerFallback);
    }

    #[tokio::test]
    async fn test_unresolvable_is_none() {
        let listing = ListingLocationInput::new("svc5", Utc::now()).with_address("Nowhere 404");
        assert!(resolver(TableGeocoder::new(&[])).resolve(&listing).await.is_none());
    }

    #[tokio::test]
    async fn test_direct_skips_geocoder() {
        let geocoder = Arc::new(TableGeocoder::new(&[("Main St 1", 10.0, 20.0)]));
        let resolver = CoordinateResolver::new(geocoder.clone());
        let listing = ListingLocationInput::new("svc1", Utc::now())
            .with_location(47.37, 8.54)
            .with_address("Main St 1");

        resolver.resolve(&listing).await;
        assert_eq!(geocoder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_drops_unresolved() {
        let geocoder = TableGeocoder::new(&[("Main St 1", 10.0, 20.0)]);
        let listings = vec![
            ListingLocationInput::new("a", Utc::now()).with_address("Main St 1"),
            ListingLocationInput::new("b", Utc::now()),
            ListingLocationInput::new("c", Utc::now()).with_location(1.0, 2.0),
        ];

        let resolved = resolver(geocoder).resolve_batch(&listings).await;
        let ids: Vec<&str> = resolved.iter().map(|r| r.listing_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
