// src/lib.rs
// DOCUMENTATION: Nearby-services map engine
// PURPOSE: Resolve, obfuscate, cluster and route listings for the map widget

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
