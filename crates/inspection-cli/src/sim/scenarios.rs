//! Pre-defined inspection scenarios.

use inspection_core::spatial::offset_flat;
use inspection_core::{GeoPoint, PhotoOffset, StructurePoint};

/// Three masts north-east of `home`, spaced roughly 40 m apart.
pub fn demo_structures(home: GeoPoint) -> Vec<StructurePoint> {
    // (east, north, ground elevation, height)
    let layout = [
        (30.0, 40.0, 0.0, 18.0),
        (70.0, 45.0, 1.5, 22.0),
        (105.0, 20.0, 3.0, 15.0),
    ];

    layout
        .iter()
        .map(|&(east_m, north_m, ground_m, height_m)| {
            let (lat, lon) = offset_flat(home.lat, home.lon, east_m, north_m);
            StructurePoint::new(lat, lon, ground_m, height_m)
        })
        .collect()
}

/// Two oblique shots from the south-west and north-east.
pub fn demo_offsets() -> Vec<PhotoOffset> {
    vec![
        PhotoOffset::new(-6.0, -6.0, 3.0, -35.0),
        PhotoOffset::new(6.0, 6.0, 3.0, -35.0),
    ]
}
