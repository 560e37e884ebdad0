//! Heading that points the aircraft nose at a structure.

/// Compass heading from a photo position back to the structure center.
///
/// The photo position sits at (`offset_east_m`, `offset_north_m`) from the
/// center, so the aircraft must face along the negated offset. Returns degrees
/// in `[0, 360)`, 0 = north, clockwise positive. A zero offset faces north.
pub fn heading_to_structure_center(offset_east_m: f64, offset_north_m: f64) -> f64 {
    if offset_east_m == 0.0 && offset_north_m == 0.0 {
        return 0.0;
    }

    let heading_deg = (-offset_east_m).atan2(-offset_north_m).to_degrees();
    let normalized = heading_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}
