// src/models/mod.rs
// DOCUMENTATION: Models module organization
// PURPOSE: Re-export model components

pub mod cluster;
pub mod coordinate;
pub mod listing;

pub use cluster::*;
pub use coordinate::*;
pub use listing::*;
