//! # Geographic Utilities
//!
//! Distance and extent helpers for trajectory analysis.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`polyline_length`] | Total length of a sample sequence in meters |
//! | [`path_length`] | Total length of a coordinate path in meters |
//! | [`compute_bounds`] | Bounding rectangle of a set of coordinates |
//!
//! ## Example
//!
//! ```rust
//! use trajectory_engine::{geo_utils, LngLat};
//!
//! let tiananmen = LngLat::new(116.3975, 39.9087);
//! let beijing_west = LngLat::new(116.3220, 39.8950);
//!
//! let dist = geo_utils::haversine_distance(&tiananmen, &beijing_west);
//! assert!((dist - 6_600.0).abs() < 300.0);
//! ```
//!
//! Distances treat the Earth as a sphere (geo's haversine). Inputs may be in
//! either frame; the GCJ02 offset changes a distance by far less than the
//! sphere approximation does.

use geo::{Distance, Haversine, Point};

use crate::coord::CoordFrame;
use crate::region::Rectangle;
use crate::{LngLat, Sample};

/// Great-circle distance in meters.
#[inline]
pub fn haversine_distance(a: &LngLat, b: &LngLat) -> f64 {
    Haversine::distance(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat))
}

/// Length of a sample sequence in meters. Fewer than two samples give 0.
pub fn polyline_length(points: &[Sample]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0].lng_lat(), &w[1].lng_lat()))
        .sum()
}

/// Length of a coordinate path in meters. Fewer than two points give 0.
pub fn path_length(points: &[LngLat]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Bounding rectangle of a set of coordinates, tagged with `frame`.
///
/// Returns `None` for empty input.
pub fn compute_bounds<I>(points: I, frame: CoordFrame) -> Option<Rectangle>
where
    I: IntoIterator<Item = LngLat>,
{
    let mut points = points.into_iter();
    let first = points.next()?;
    let mut rect = Rectangle::new(first.lng, first.lng, first.lat, first.lat, frame);

    for p in points {
        rect.min_lat = rect.min_lat.min(p.lat);
        rect.max_lat = rect.max_lat.max(p.lat);
        rect.min_lng = rect.min_lng.min(p.lng);
        rect.max_lng = rect.max_lng.max(p.lng);
    }
    Some(rect)
}
