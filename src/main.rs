// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Initialize config, geocoder and start the map preview HTTP server

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use nearby_map::config::Config;
use nearby_map::handlers;
use nearby_map::services::{start_cleanup_task, GeocodeCache, Geocoder, NominatimClient};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Load configuration
    let config = Config::from_env();
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // 3. Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        let log_level = if !config.log_level.is_empty() {
            &config.log_level
        } else {
            "info,actix_web=info"
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    log::info!("Starting nearby-map service...");
    log::info!("Environment: {}", config.environment);
    log::info!(
        "Server Address: {}:{}",
        config.server_address,
        config.server_port
    );

    // 4. Geocode cache shared by every request
    let cache = Arc::new(GeocodeCache::new(config.geocode_cache_ttl));
    log::info!(
        "Initialized geocode cache (TTL: {}s)",
        config.geocode_cache_ttl
    );

    start_cleanup_task(cache.clone(), 300);
    log::info!("Started cache cleanup task (interval: 5 minutes)");

    // 5. Rate limited geocoder
    let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimClient::new_with_cache(
        config.geocoder_base_url.clone(),
        config.geocoder_user_agent.clone(),
        config.geocode_requests_per_second,
        cache.clone(),
    ));
    log::info!(
        "Geocoder: {} ({} req/s)",
        config.geocoder_base_url,
        config.geocode_requests_per_second
    );

    // 6. Start HTTP server
    let server_addr = format!("{}:{}", config.server_address, config.server_port);
    let config_clone = config.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config_clone.clone()))
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::Data::from(geocoder.clone()))
            // Middleware
            .wrap(Logger::default())
            .wrap(actix_web::middleware::Compress::default())
            // Routes
            .configure(handlers::health_config)
            .configure(handlers::map_config)
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {}", server_addr))?
    .run()
    .await
    .context("HTTP server terminated with an error")
}
