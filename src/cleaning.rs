//! # Trajectory Cleaning
//!
//! Consecutive-duplicate removal and Douglas–Peucker simplification.
//!
//! Distances are planar, in degrees, in whatever frame the points are in.
//! Both operations return new vectors and never touch their input.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrajectoryError};
use crate::{Sample, Trajectory};

/// Cleaning options for trajectory retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Run Douglas–Peucker after deduplication. Default: false
    pub simplify: bool,
    /// Simplification tolerance in degrees. Default: 0.0001 (~11 meters)
    pub tolerance: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            simplify: false,
            tolerance: 0.0001,
        }
    }
}

impl CleanConfig {
    /// Reject tolerances that are negative or not a number.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(TrajectoryError::config(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Drop points identical in position to the last kept point.
///
/// ```rust
/// use trajectory_engine::{cleaning::dedup, Sample};
/// # use chrono::NaiveDate;
/// # let t = NaiveDate::from_ymd_opt(2008, 2, 2).unwrap().and_hms_opt(8, 0, 0).unwrap();
///
/// let p0 = Sample::new("1", t, 116.30, 39.90);
/// let p1 = Sample::new("1", t, 116.30, 39.90);
/// let p2 = Sample::new("1", t, 116.31, 39.91);
/// assert_eq!(dedup(&[p0.clone(), p1, p2.clone()]), vec![p0, p2]);
/// ```
pub fn dedup(points: &[Sample]) -> Vec<Sample> {
    let mut unique: Vec<Sample> = Vec::with_capacity(points.len());
    for p in points {
        match unique.last() {
            Some(last) if last.lat == p.lat && last.lng == p.lng => {}
            _ => unique.push(p.clone()),
        }
    }
    unique
}

/// Distance from `p` to the infinite line through `start` and `end`.
///
/// Falls back to point distance when the chord is degenerate.
fn perpendicular_distance(p: &Sample, start: &Sample, end: &Sample) -> f64 {
    let dx = end.lng - start.lng;
    let dy = end.lat - start.lat;
    if dx == 0.0 && dy == 0.0 {
        return (p.lng - start.lng).hypot(p.lat - start.lat);
    }
    let area = (dx * (start.lat - p.lat) - (start.lng - p.lng) * dy).abs();
    area / dx.hypot(dy)
}

/// Douglas–Peucker simplification.
///
/// Sequences of two points or fewer are returned as-is. The output is always
/// a subsequence of the input that keeps the first and last point.
pub fn simplify(points: &[Sample], tolerance: f64) -> Vec<Sample> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then(|| p.clone()))
        .collect()
}

/// Mark the points kept in `points[first..=last]`.
///
/// Recursion is on index ranges, so the junction point shared by both halves
/// is marked once.
fn mark_kept(points: &[Sample], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    keep[first] = true;
    keep[last] = true;
    if last <= first + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut index = first;
    for i in (first + 1)..last {
        let dist = perpendicular_distance(&points[i], &points[first], &points[last]);
        if dist > max_dist {
            index = i;
            max_dist = dist;
        }
    }

    if max_dist > tolerance {
        mark_kept(points, first, index, tolerance, keep);
        mark_kept(points, index, last, tolerance, keep);
    }
}

/// Deduplicate and optionally simplify a trajectory.
pub fn clean(trajectory: &Trajectory, simplify_flag: bool, tolerance: f64) -> Trajectory {
    let mut points = dedup(&trajectory.points);
    if simplify_flag {
        points = simplify(&points, tolerance);
    }
    Trajectory {
        vehicle_id: trajectory.vehicle_id.clone(),
        frame: trajectory.frame,
        points,
    }
}

/// [`clean`] driven by a [`CleanConfig`].
pub fn clean_with(trajectory: &Trajectory, config: &CleanConfig) -> Trajectory {
    clean(trajectory, config.simplify, config.tolerance)
}
