// src/services/mod.rs
// DOCUMENTATION: Services module organization
// PURPOSE: Re-export service components

pub mod bootstrap;
pub mod cluster_builder;
pub mod coordinate_cache;
pub mod coordinate_resolver;
pub mod directions;
pub mod geocode_cache;
pub mod geocoding_client;
pub mod headless_provider;
pub mod jitter;
pub mod map_provider;
pub mod notifier;
pub mod overlay_manager;
pub mod widget;

pub use bootstrap::*;
pub use cluster_builder::*;
pub use coordinate_cache::*;
pub use coordinate_resolver::*;
pub use directions::*;
pub use geocode_cache::*;
pub use geocoding_client::*;
pub use headless_provider::*;
pub use jitter::*;
pub use map_provider::*;
pub use notifier::*;
pub use overlay_manager::*;
pub use widget::*;
