// src/services/jitter.rs
// DOCUMENTATION: Deterministic privacy jitter for provider locations
// PURPOSE: Move every marker a few hundred meters off the real address,
//          always by the same amount for the same listing

use crate::models::{JitteredCoordinate, ResolvedCoordinate};

/// Offset span in degrees (±0.00125°, roughly ±140 m of latitude)
pub const DEFAULT_JITTER_AMPLITUDE: f64 = 0.0025;

/// Golden ratio, decorrelates the longitude offset from the latitude one
const PHI: f64 = 1.618_033_988_749_895;

/// Rolling 32-bit hash over UTF-16 code units: h = (h << 5) - h + c
pub fn listing_hash(listing_id: &str) -> i32 {
    listing_id.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

/// Hash normalized to [0, 1)
pub fn listing_seed(listing_id: &str) -> f64 {
    f64::from(listing_hash(listing_id).unsigned_abs() % 10_000) / 10_000.0
}

/// (lat, lng) offsets in degrees for a listing
pub fn jitter_offsets(listing_id: &str, amplitude: f64) -> (f64, f64) {
    let seed = listing_seed(listing_id);
    let lat_offset = (seed - 0.5) * amplitude;
    let lng_offset = ((seed * PHI) % 1.0 - 0.5) * amplitude;
    (lat_offset, lng_offset)
}

/// Apply the listing's offsets to its resolved position.
///
/// Pure: callers that need the value again must read it back from the
/// `CoordinateCache` rather than calling this a second time.
pub fn apply_jitter(resolved: ResolvedCoordinate, amplitude: f64) -> JitteredCoordinate {
    let (offset_lat, offset_lng) = jitter_offsets(&resolved.listing_id, amplitude);

    JitteredCoordinate {
        lat: resolved.lat + offset_lat,
        lng: resolved.lng + offset_lng,
        offset_lat,
        offset_lng,
        source: resolved.source,
        listing_id: resolved.listing_id,
    }
}
