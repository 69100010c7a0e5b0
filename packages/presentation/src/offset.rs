//! Spreading out locations that share exact coordinates.

use std::collections::HashMap;

use notion_map_location_models::Location;

/// Offset in degrees applied per rank to both latitude and longitude
/// (roughly 20 meters).
pub const OFFSET_DEGREES: f64 = 0.0002;

/// Exact coordinate identity; `-0.0` and `0.0` compare equal.
fn coordinate_key(location: &Location) -> (u64, u64) {
    ((location.lat + 0.0).to_bits(), (location.lng + 0.0).to_bits())
}

/// Returns the locations with duplicates nudged apart.
///
/// Locations with identical coordinates form a group in input order. The
/// first member keeps its position; the member at rank `r` moves by
/// `r * OFFSET_DEGREES` on both axes. Unique coordinates are untouched.
#[must_use]
pub fn get_offset_locations(locations: &[Location]) -> Vec<Location> {
    let mut seen: HashMap<(u64, u64), u32> = HashMap::new();

    locations
        .iter()
        .map(|location| {
            let rank = seen.entry(coordinate_key(location)).or_insert(0);
            let mut placed = location.clone();
            if *rank > 0 {
                let delta = f64::from(*rank) * OFFSET_DEGREES;
                placed.lat += delta;
                placed.lng += delta;
            }
            *rank += 1;
            placed
        })
        .collect()
}
