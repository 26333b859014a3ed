// src/handlers/map.rs
// DOCUMENTATION: HTTP handlers for map previews
// PURPOSE: Run the widget pipeline headlessly and return what it would draw

use crate::config::Config;
use crate::errors::MapError;
use crate::models::{Cluster, CoordinateSource, LatLng, ListingLocationInput};
use crate::services::{
    to_feature_collection, BootstrapState, GeocodeCache, Geocoder, HeadlessMapProvider,
    LogNotifier, MapWidget, MarkerStyle, RenderOutcome,
};
use actix_web::{web, HttpResponse, Responder};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Body of POST /api/v1/map/layout
#[derive(Debug, Deserialize, Validate)]
pub struct LayoutRequest {
    #[validate]
    pub listings: Vec<ListingLocationInput>,

    /// User position; the configured default center is used when absent
    #[serde(default)]
    pub user: Option<LatLng>,
}

#[derive(Debug, Serialize)]
pub struct MemberView {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub source: CoordinateSource,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ClusterView {
    pub key: String,
    pub centroid: LatLng,
    pub count: usize,
    pub style: MarkerStyle,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Serialize)]
pub struct BoundsView {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub clusters: Vec<ClusterView>,
    pub bounds: Option<BoundsView>,
    pub marker_count: usize,
    pub listing_count: usize,
    pub geojson: FeatureCollection,
}

impl From<&Cluster> for ClusterView {
    fn from(cluster: &Cluster) -> Self {
        let style = if cluster.is_single() {
            MarkerStyle::Single
        } else {
            MarkerStyle::Cluster {
                count: cluster.len(),
            }
        };

        Self {
            key: cluster.key.to_string(),
            centroid: cluster.centroid(),
            count: cluster.len(),
            style,
            members: cluster
                .members
                .iter()
                .map(|m| MemberView {
                    id: m.listing_id().to_string(),
                    lat: m.coordinate.lat,
                    lng: m.coordinate.lng,
                    source: m.coordinate.source,
                    title: m.label().to_string(),
                })
                .collect(),
        }
    }
}

/// POST /api/v1/map/layout
/// Resolve, jitter and cluster a listing batch exactly as the map widget would
pub async fn layout_preview(
    config: web::Data<Config>,
    geocoder: web::Data<dyn Geocoder>,
    req: web::Json<LayoutRequest>,
) -> Result<impl Responder, MapError> {
    if let Err(e) = req.validate() {
        return Err(MapError::ValidationError(e.to_string()));
    }
    if req.listings.len() > config.max_layout_listings {
        return Err(MapError::InvalidInput(format!(
            "At most {} listings per request, got {}",
            config.max_layout_listings,
            req.listings.len()
        )));
    }
    if let Some(user) = req.user {
        if !user.is_finite() {
            return Err(MapError::InvalidInput("User position must be finite".to_string()));
        }
    }

    let LayoutRequest { listings, user } = req.into_inner();
    let widget = MapWidget::new(
        config.widget_settings(),
        Arc::new(HeadlessMapProvider::new()),
        geocoder.into_inner(),
        Arc::new(LogNotifier),
    );

    if let BootstrapState::Failed(failure) = widget.show(user).await? {
        log::error!("Headless map failed to start: {}", failure.message);
        return Err(MapError::ServiceUnavailable);
    }

    let outcome = widget.render_listings(listings, user).await;
    widget.hide().await;

    match outcome {
        RenderOutcome::Rendered { layout, markers } => {
            let response = LayoutResponse {
                clusters: layout.clusters.iter().map(ClusterView::from).collect(),
                bounds: layout.bounds.map(|rect| BoundsView {
                    south_west: LatLng::new(rect.min().y, rect.min().x),
                    north_east: LatLng::new(rect.max().y, rect.max().x),
                }),
                marker_count: markers,
                listing_count: layout.listing_count(),
                geojson: to_feature_collection(&layout),
            };
            Ok(HttpResponse::Ok().json(response))
        }
        RenderOutcome::Superseded | RenderOutcome::NotReady => Err(MapError::ServiceUnavailable),
    }
}

/// GET /api/v1/map/geocode-cache/stats
pub async fn geocode_cache_stats(cache: web::Data<Arc<GeocodeCache>>) -> impl Responder {
    HttpResponse::Ok().json(cache.stats().await)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/map")
            .route("/layout", web::post().to(layout_preview))
            .route("/geocode-cache/stats", web::get().to(geocode_cache_stats)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::coordinate_resolver::tests::TableGeocoder;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn app_data(max_listings: usize) -> (web::Data<Config>, web::Data<dyn Geocoder>) {
        let mut config = Config::from_env();
        config.max_layout_listings = max_listings;

        let geocoder: Arc<dyn Geocoder> =
            Arc::new(TableGeocoder::new(&[("Bahnhofstrasse 1", 47.3717, 8.5390)]));
        (web::Data::new(config), web::Data::from(geocoder))
    }

    #[actix_rt::test]
    async fn test_layout_clusters_nearby_listings() {
        let (config, geocoder) = app_data(10);
        let app = test::init_service(
            App::new()
                .app_data(config)
                .app_data(geocoder)
                .configure(super::config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/map/layout")
            .set_json(json!({
                "listings": [
                    { "id": "svc1", "locationLat": 47.37, "locationLng": "8.54",
                      "createdAt": "2024-01-01T10:00:00Z", "display": { "title": "Plumbing" } },
                    { "id": "svc2", "locationLat": "47.3701", "locationLng": 8.5401,
                      "createdAt": "2024-01-02T10:00:00Z" },
                    { "id": "svc3", "addresses": ["Bahnhofstrasse 1"],
                      "createdAt": "2024-01-03T10:00:00Z" },
                    { "id": "nowhere", "createdAt": "2024-01-04T10:00:00Z" }
                ],
                "user": { "lat": 47.36, "lng": 8.53 }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["listing_count"], 3);
        // one cluster plus the user marker
        assert_eq!(body["marker_count"], 2);
        assert_eq!(body["geojson"]["type"], "FeatureCollection");

        let cluster = &body["clusters"][0];
        assert_eq!(cluster["count"], 3);
        assert_eq!(cluster["style"]["kind"], "cluster");
        assert_eq!(cluster["members"][0]["id"], "svc1");
        assert_eq!(cluster["members"][0]["title"], "Plumbing");
        assert_eq!(cluster["members"][2]["id"], "svc3");
        assert_eq!(cluster["members"][2]["source"], "geocoded");
        assert!(body["bounds"]["south_west"]["lat"].is_number());
    }

    #[actix_rt::test]
    async fn test_layout_rejects_oversized_batch() {
        let (config, geocoder) = app_data(1);
        let app = test::init_service(
            App::new()
                .app_data(config)
                .app_data(geocoder)
                .configure(super::config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/map/layout")
            .set_json(json!({
                "listings": [
                    { "id": "a", "createdAt": "2024-01-01T10:00:00Z" },
                    { "id": "b", "createdAt": "2024-01-01T10:00:00Z" }
                ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[actix_rt::test]
    async fn test_layout_rejects_empty_listing_id() {
        let (config, geocoder) = app_data(10);
        let app = test::init_service(
            App::new()
                .app_data(config)
                .app_data(geocoder)
                .configure(super::config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/map/layout")
            .set_json(json!({
                "listings": [ { "id": "", "createdAt": "2024-01-01T10:00:00Z" } ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_geocode_cache_stats() {
        let cache = Arc::new(GeocodeCache::new(60));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(cache))
                .configure(super::config),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/map/geocode-cache/stats")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total_entries"], 0);
    }
}
