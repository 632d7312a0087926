//! Bindings for the `demo.geometry` library, generated by `build.rs` from
//! `schema/geometry.json`.

include!(concat!(env!("OUT_DIR"), "/demo/geometry/wire.rs"));

pub use demo::geometry::*;

/// Shoelace area of a polygon.
pub fn polygon_area(polygon: &Polygon) -> f64 {
    let points = &polygon.points;
    if points.is_empty() {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    twice.abs() as f64 / 2.0
}
