//! Concrete analyses built on the region index, the transition analyzer and
//! the aggregation framework.
//!
//! Every analysis takes a slice of [`WorkUnit`](crate::WorkUnit)s, a config
//! that is validated before any unit runs, and [`RunOptions`](crate::RunOptions).
//! It returns an [`AnalysisRun`](crate::AnalysisRun) whose result holds GCJ02
//! coordinates only.

pub mod flow;
pub mod frequent_paths;
pub mod heatmap;
pub mod shortest_path;
pub mod trajectories;

use crate::error::{Result, TrajectoryError};
use crate::parser::{LAT_RANGE, LNG_RANGE};
use crate::region::{Rectangle, Region};

/// Number of hour-of-day buckets.
pub(crate) const HOURS: usize = 24;

/// Cell size of the membership grid attached to analysis regions.
const REGION_INDEX_CELL: f64 = 0.005;

/// Widening of the analysis area so that it covers the GCJ02 offset.
const AREA_MARGIN: f64 = 0.02;

/// Normalize `rect` and attach a grid index covering the analysis area in
/// the rectangle's frame. Points outside the area use the exact test.
pub(crate) fn indexed_region(rect: Rectangle) -> Result<Region> {
    let extent = Rectangle::new(
        LNG_RANGE.0 - AREA_MARGIN,
        LNG_RANGE.1 + AREA_MARGIN,
        LAT_RANGE.0 - AREA_MARGIN,
        LAT_RANGE.1 + AREA_MARGIN,
        rect.frame,
    );
    Region::new(rect)?.with_grid_index(&extent, REGION_INDEX_CELL)
}

/// Reject hours outside 0-23.
pub(crate) fn validate_hour(hour: u32) -> Result<()> {
    if hour as usize >= HOURS {
        return Err(TrajectoryError::config(format!(
            "hour must be in 0..=23, got {}",
            hour
        )));
    }
    Ok(())
}

/// Reject grid sizes that are not strictly positive.
pub(crate) fn validate_cell_size(name: &str, size: f64) -> Result<()> {
    if !(size.is_finite() && size > 0.0) {
        return Err(TrajectoryError::config(format!(
            "{} must be positive, got {}",
            name, size
        )));
    }
    Ok(())
}
