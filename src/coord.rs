//! # Coordinate Transform
//!
//! Conversion between the WGS84 frame recorded by GPS receivers and the GCJ02
//! frame required for map display in mainland China.
//!
//! GCJ02 is WGS84 plus a non-linear offset computed from two polynomial
//! functions of the position relative to `(105°E, 35°N)`, scaled by the
//! Krasovsky 1940 ellipsoid. Points outside mainland China are not offset.
//!
//! The inverse is a first-order approximation: the offset is evaluated at
//! the GCJ02 point and subtracted. A round trip reproduces the input to
//! within a few `1e-5` degrees, never bit-exactly.
//!
//! ```rust
//! use trajectory_engine::coord::{gcj02_to_wgs84, wgs84_to_gcj02};
//!
//! let (lng, lat) = wgs84_to_gcj02(116.397, 39.908);
//! let (back_lng, back_lat) = gcj02_to_wgs84(lng, lat);
//! assert!((back_lng - 116.397).abs() < 1e-4);
//! assert!((back_lat - 39.908).abs() < 1e-4);
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Krasovsky 1940 semi-major axis in meters.
const KRASOVSKY_A: f64 = 6_378_245.0;

/// Krasovsky 1940 first eccentricity squared.
const KRASOVSKY_EE: f64 = 0.006_693_421_622_965_943_23;

/// A coordinate reference frame.
///
/// Ingested samples are always [`CoordFrame::Wgs84`]. Everything handed back
/// to the serving layer is [`CoordFrame::Gcj02`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordFrame {
    /// Raw GPS frame
    Wgs84,
    /// Display frame for mainland China maps
    #[default]
    Gcj02,
}

impl CoordFrame {
    /// Project a WGS84 coordinate into this frame.
    #[inline]
    pub fn project(self, lng: f64, lat: f64) -> (f64, f64) {
        match self {
            CoordFrame::Wgs84 => (lng, lat),
            CoordFrame::Gcj02 => wgs84_to_gcj02(lng, lat),
        }
    }
}

/// True when the point lies outside the mainland China box where the offset
/// is applied.
#[inline]
pub fn out_of_china(lng: f64, lat: f64) -> bool {
    !(72.004..=137.8347).contains(&lng) || !(0.8293..=55.8271).contains(&lat)
}

/// Convert a WGS84 coordinate to GCJ02. Returns `(lng, lat)`.
pub fn wgs84_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    if out_of_china(lng, lat) {
        return (lng, lat);
    }
    let (d_lng, d_lat) = offset(lng, lat);
    (lng + d_lng, lat + d_lat)
}

/// Convert a GCJ02 coordinate back to WGS84 (approximate). Returns `(lng, lat)`.
pub fn gcj02_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    if out_of_china(lng, lat) {
        return (lng, lat);
    }
    let (d_lng, d_lat) = offset(lng, lat);
    (lng - d_lng, lat - d_lat)
}

/// Offset `(d_lng, d_lat)` in degrees to add to a WGS84 point at `(lng, lat)`.
fn offset(lng: f64, lat: f64) -> (f64, f64) {
    let mut d_lat = transform_lat(lng - 105.0, lat - 35.0);
    let mut d_lng = transform_lng(lng - 105.0, lat - 35.0);

    let rad_lat = lat / 180.0 * PI;
    let magic = 1.0 - KRASOVSKY_EE * rad_lat.sin() * rad_lat.sin();
    let sqrt_magic = magic.sqrt();

    d_lat = (d_lat * 180.0) / ((KRASOVSKY_A * (1.0 - KRASOVSKY_EE)) / (magic * sqrt_magic) * PI);
    d_lng = (d_lng * 180.0) / (KRASOVSKY_A / sqrt_magic * rad_lat.cos() * PI);

    (d_lng, d_lat)
}

fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}
