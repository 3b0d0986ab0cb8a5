//! # Trajectory Engine
//!
//! Parallel spatio-temporal analytics over per-vehicle GPS trajectory logs.
//!
//! Each input file holds one vehicle's trajectory, one sample per line in the
//! form `vehicle_id,YYYY-MM-DD HH:MM:SS,lng,lat` (WGS84). The engine provides:
//! - Line parsing and validation against the analysis area
//! - WGS84 ⇄ GCJ02 coordinate correction
//! - Trajectory deduplication and Douglas–Peucker simplification
//! - Rectangle membership and grid-cell addressing
//! - A per-vehicle region-transition state machine
//! - A parallel map-merge framework running analyses over many vehicle files
//!
//! On top of that sit the concrete analyses: density heatmaps, region flow
//! counts, frequent-path mining, shortest transit times and trajectory
//! retrieval. All coordinates returned by an analysis are GCJ02.
//!
//! ## Quick Start
//!
//! ```rust
//! use trajectory_engine::{parse_line, cleaning, wgs84_to_gcj02};
//!
//! let sample = parse_line("1131,2008-02-02 13:30:44,116.30,39.90").unwrap();
//! assert_eq!(sample.hour(), 13);
//!
//! let (lng, lat) = wgs84_to_gcj02(sample.lng, sample.lat);
//! assert!(lng > sample.lng && lat > sample.lat);
//!
//! let points = cleaning::dedup(&[sample.clone(), sample.clone()]);
//! assert_eq!(points.len(), 1);
//! ```

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrajectoryError};

// WGS84 <-> GCJ02 conversion
pub mod coord;
pub use coord::{gcj02_to_wgs84, wgs84_to_gcj02, CoordFrame};

// Raw line decoding and vehicle file loading
pub mod parser;
pub use parser::{is_valid_point, parse_line, read_trajectory};

// Deduplication and Douglas-Peucker simplification
pub mod cleaning;
pub use cleaning::{clean, dedup, simplify, CleanConfig};

// Geographic utilities (distance, bounds)
pub mod geo_utils;

// Rectangle membership, grid cells and path encoding
pub mod region;
pub use region::{cell_center, encode_path, grid_cell, GridCell, GridIndex, PathKey, Rectangle, Region};

// Per-vehicle region transition state machine
pub mod analyzer;
pub use analyzer::{CompletedSegment, RegionMode, TransitionAnalyzer, TransitionEvent, TransitionSink};

// Vehicle file discovery and units of work
pub mod source;
pub use source::{list_vehicle_files, list_vehicle_ids, WorkUnit};

// Parallel map-merge framework
pub mod aggregate;
pub use aggregate::{
    run_analysis, Analysis, AnalysisRun, CancellationToken, PartialAggregate, RunOptions,
    RunSummary, UnitFailure,
};

// Rectangle + time range lookup over in-memory samples
pub mod region_query;
pub use region_query::RegionQueryIndex;

// Concrete analyses
pub mod analyses;
pub use analyses::flow::{analyze_flow, FlowConfig, FlowHour, FlowResult};
pub use analyses::frequent_paths::{
    mine_frequent_paths, FrequentPath, FrequentPathConfig, FrequentPathResult,
};
pub use analyses::heatmap::{generate_heatmap, HeatmapCell, HeatmapConfig, HeatmapResult};
pub use analyses::shortest_path::{
    analyze_shortest_paths, HourlyShortestPath, ShortestPathConfig, ShortestPathResult,
    TravelTimeMetric,
};
pub use analyses::trajectories::{retrieve_trajectories, TrajectoryQuery, VehicleSelection};

/// Timestamp layout used by the raw logs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Core Types
// ============================================================================

/// One validated GPS sample.
///
/// Coordinates are WGS84 as recorded; see [`Trajectory::frame`] for points
/// that have been moved to the display frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub vehicle_id: String,
    pub timestamp: NaiveDateTime,
    pub lng: f64,
    pub lat: f64,
}

impl Sample {
    /// Create a new sample.
    pub fn new(vehicle_id: impl Into<String>, timestamp: NaiveDateTime, lng: f64, lat: f64) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            lng,
            lat,
        }
    }

    /// Hour of day (0-23) of the timestamp.
    #[inline]
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// The bare coordinate pair.
    #[inline]
    pub fn lng_lat(&self) -> LngLat {
        LngLat::new(self.lng, self.lat)
    }

    /// Copy of this sample with its coordinates projected from WGS84 into `frame`.
    pub fn projected(&self, frame: CoordFrame) -> Self {
        let (lng, lat) = frame.project(self.lng, self.lat);
        Self {
            vehicle_id: self.vehicle_id.clone(),
            timestamp: self.timestamp,
            lng,
            lat,
        }
    }
}

/// A bare `(lng, lat)` coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// One vehicle's time-ordered samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub vehicle_id: String,
    /// Frame of every point in `points`
    pub frame: CoordFrame,
    pub points: Vec<Sample>,
}

impl Trajectory {
    /// Create a trajectory of raw WGS84 samples.
    pub fn new(vehicle_id: impl Into<String>, points: Vec<Sample>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            frame: CoordFrame::Wgs84,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Copy of this trajectory in the display frame.
    ///
    /// A trajectory already in GCJ02 is returned unchanged.
    pub fn to_display_frame(&self) -> Self {
        if self.frame == CoordFrame::Gcj02 {
            return self.clone();
        }
        Self {
            vehicle_id: self.vehicle_id.clone(),
            frame: CoordFrame::Gcj02,
            points: self.points.iter().map(|p| p.projected(CoordFrame::Gcj02)).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;

    /// Timestamp on 2008-02-02 at the given time.
    pub fn ts(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2008, 2, 2)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .expect("valid test timestamp")
    }

    pub fn sample(vehicle: &str, hour: u32, minute: u32, lng: f64, lat: f64) -> Sample {
        Sample::new(vehicle, ts(hour, minute, 0), lng, lat)
    }
}
