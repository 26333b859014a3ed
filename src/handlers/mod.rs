// src/handlers/mod.rs
// DOCUMENTATION: Handlers module organization
// PURPOSE: Re-export handler components

pub mod health;
pub mod map;

pub use health::config as health_config;
pub use map::config as map_config;
