//! Frequent path mining.
//!
//! Paths are compared by their grid signature ([`encode_path`] over GCJ02
//! points): two paths are "the same" when they visit the same cells with the
//! same sampling. The analysis counts paths per signature and reports the
//! most frequent ones.
//!
//! Two sources of paths are supported:
//! - **Between areas**: every completed A→B segment.
//! - **Whole trajectories**: with no areas configured, each vehicle's full
//!   trajectory in a unit is one path.
//!
//! Paths shorter than `min_distance_m` (haversine length) are ignored. Each
//! signature keeps one representative path: the one whose segment started
//! earliest, ties broken by vehicle id.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{indexed_region, validate_cell_size};
use crate::aggregate::{run_analysis, Analysis, AnalysisRun, PartialAggregate, RunOptions};
use crate::analyzer::{RegionMode, TransitionAnalyzer, TransitionEvent};
use crate::coord::wgs84_to_gcj02;
use crate::error::{Result, TrajectoryError};
use crate::geo_utils::path_length;
use crate::region::{encode_path, PathKey, Rectangle};
use crate::source::{vehicle_runs, WorkUnit};
use crate::{LngLat, Sample};

/// Configuration for frequent path mining
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequentPathConfig {
    /// Start area; set together with `area_b`
    pub area_a: Option<Rectangle>,
    /// End area; set together with `area_a`
    pub area_b: Option<Rectangle>,
    /// Number of paths to report (default: 5)
    pub top_k: usize,
    /// Signature grid size in degrees (default: 0.001)
    pub grid_size: f64,
    /// Minimum path length in meters (default: 1000)
    pub min_distance_m: f64,
}

impl Default for FrequentPathConfig {
    fn default() -> Self {
        Self {
            area_a: None,
            area_b: None,
            top_k: 5,
            grid_size: 0.001,
            min_distance_m: 1000.0,
        }
    }
}

impl FrequentPathConfig {
    /// A→B mining with default settings.
    pub fn between(area_a: Rectangle, area_b: Rectangle) -> Self {
        Self {
            area_a: Some(area_a),
            area_b: Some(area_b),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.area_a.is_some() != self.area_b.is_some() {
            return Err(TrajectoryError::config(
                "area_a and area_b must be given together",
            ));
        }
        if self.top_k == 0 {
            return Err(TrajectoryError::config("top_k must be at least 1"));
        }
        validate_cell_size("grid_size", self.grid_size)?;
        if !(self.min_distance_m.is_finite() && self.min_distance_m >= 0.0) {
            return Err(TrajectoryError::config(format!(
                "min_distance_m must be a non-negative number, got {}",
                self.min_distance_m
            )));
        }
        Ok(())
    }
}

/// One mined path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentPath {
    /// Number of paths sharing this signature
    pub count: u64,
    /// Vehicle of the representative path
    pub vehicle_id: String,
    /// Representative path (GCJ02)
    pub path: Vec<LngLat>,
}

/// Mining result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentPathResult {
    /// Number of distinct signatures
    pub total: usize,
    pub top_k: usize,
    /// At most `top_k` paths, most frequent first
    pub paths: Vec<FrequentPath>,
}

#[derive(Debug, Clone, PartialEq)]
struct Representative {
    entry_time: NaiveDateTime,
    vehicle_id: String,
    path: Vec<LngLat>,
}

impl Representative {
    fn rank(&self) -> (NaiveDateTime, &str) {
        (self.entry_time, &self.vehicle_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PathTally {
    count: u64,
    representative: Representative,
}

/// Path counts keyed by signature.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrequentPathPartial {
    tallies: HashMap<PathKey, PathTally>,
}

impl FrequentPathPartial {
    fn add(&mut self, key: PathKey, count: u64, representative: Representative) {
        match self.tallies.get_mut(&key) {
            Some(tally) => {
                tally.count += count;
                if representative.rank() < tally.representative.rank() {
                    tally.representative = representative;
                }
            }
            None => {
                self.tallies.insert(key, PathTally { count, representative });
            }
        }
    }
}

impl PartialAggregate for FrequentPathPartial {
    fn merge(&mut self, other: Self) {
        for (key, tally) in other.tallies {
            self.add(key, tally.count, tally.representative);
        }
    }
}

struct FrequentPathAnalysis {
    mode: Option<RegionMode>,
    grid_size: f64,
    min_distance_m: f64,
}

impl FrequentPathAnalysis {
    /// Project a WGS84 path to GCJ02 and tally it if long enough.
    fn record(&self, partial: &mut FrequentPathPartial, samples: &[Sample]) {
        let path: Vec<LngLat> = samples
            .iter()
            .map(|s| {
                let (lng, lat) = wgs84_to_gcj02(s.lng, s.lat);
                LngLat::new(lng, lat)
            })
            .collect();
        if path_length(&path) < self.min_distance_m {
            return;
        }
        let key = encode_path(&path, self.grid_size);
        partial.add(
            key,
            1,
            Representative {
                entry_time: samples[0].timestamp,
                vehicle_id: samples[0].vehicle_id.clone(),
                path,
            },
        );
    }
}

impl Analysis for FrequentPathAnalysis {
    type Partial = FrequentPathPartial;

    fn name(&self) -> &'static str {
        "frequent_paths"
    }

    fn analyze_unit(&self, samples: &[Sample]) -> FrequentPathPartial {
        let mut partial = FrequentPathPartial::default();
        match &self.mode {
            Some(mode) => {
                let mut analyzer = TransitionAnalyzer::new(mode.clone());
                analyzer.run(samples, &mut |event: TransitionEvent<'_>| {
                    if let TransitionEvent::Completed(segment) = event {
                        self.record(&mut partial, segment.path);
                    }
                });
            }
            None => {
                for run in vehicle_runs(samples).into_iter().filter(|r| r.len() >= 2) {
                    self.record(&mut partial, run);
                }
            }
        }
        partial
    }
}

fn build_result(partial: FrequentPathPartial, top_k: usize) -> FrequentPathResult {
    let total = partial.tallies.len();
    let mut ranked: Vec<(PathKey, PathTally)> = partial.tallies.into_iter().collect();
    ranked.sort_by(|(ka, a), (kb, b)| b.count.cmp(&a.count).then_with(|| ka.cmp(kb)));

    let paths = ranked
        .into_iter()
        .take(top_k)
        .map(|(_, tally)| FrequentPath {
            count: tally.count,
            vehicle_id: tally.representative.vehicle_id,
            path: tally.representative.path,
        })
        .collect();

    FrequentPathResult { total, top_k, paths }
}

/// Mine the `top_k` most frequent paths across all units.
pub fn mine_frequent_paths(
    units: &[WorkUnit],
    config: &FrequentPathConfig,
    options: &RunOptions,
) -> Result<AnalysisRun<FrequentPathResult>> {
    config.validate()?;
    let mode = match (config.area_a, config.area_b) {
        (Some(a), Some(b)) => Some(RegionMode::Pair {
            start: indexed_region(a)?,
            end: indexed_region(b)?,
        }),
        _ => None,
    };
    let analysis = FrequentPathAnalysis {
        mode,
        grid_size: config.grid_size,
        min_distance_m: config.min_distance_m,
    };
    Ok(run_analysis(&analysis, units, options)?.map(|p| build_result(p, config.top_k)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::CoordFrame;
    use crate::test_support::sample;

    fn area_a() -> Rectangle {
        Rectangle::new(116.30, 116.32, 39.90, 39.92, CoordFrame::Wgs84)
    }

    fn area_b() -> Rectangle {
        Rectangle::new(116.35, 116.37, 39.88, 39.90, CoordFrame::Wgs84)
    }

    fn a_to_b(vehicle: &str, hour: u32, via_lat: f64) -> WorkUnit {
        WorkUnit::Samples {
            label: vehicle.to_string(),
            samples: vec![
                sample(vehicle, hour, 0, 116.20, 39.91),
                sample(vehicle, hour, 2, 116.31, 39.91),
                sample(vehicle, hour, 4, 116.33, via_lat),
                sample(vehicle, hour, 7, 116.36, 39.89),
            ],
        }
    }

    fn config() -> FrequentPathConfig {
        FrequentPathConfig {
            min_distance_m: 0.0,
            ..FrequentPathConfig::between(area_a(), area_b())
        }
    }

    #[test]
    fn test_identical_segments_share_signature() {
        let units = vec![a_to_b("2", 9, 39.90), a_to_b("1", 8, 39.90)];
        let run = mine_frequent_paths(&units, &config(), &RunOptions::default()).unwrap();
        let result = run.result;
        assert_eq!(result.total, 1);
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].count, 2);
        // Earliest entry wins
        assert_eq!(result.paths[0].vehicle_id, "1");
        assert_eq!(result.paths[0].path.len(), 3);
    }

    #[test]
    fn test_ranking_and_top_k() {
        let units = vec![
            a_to_b("1", 8, 39.90),
            a_to_b("2", 8, 39.90),
            a_to_b("3", 8, 39.95),
        ];
        let config = FrequentPathConfig { top_k: 1, ..config() };
        let run = mine_frequent_paths(&units, &config, &RunOptions::default()).unwrap();
        assert_eq!(run.result.total, 2);
        assert_eq!(run.result.paths.len(), 1);
        assert_eq!(run.result.paths[0].count, 2);
    }

    #[test]
    fn test_min_distance_filters_short_paths() {
        let units = vec![a_to_b("1", 8, 39.90)];
        let config = FrequentPathConfig {
            min_distance_m: 100_000.0,
            ..config()
        };
        let run = mine_frequent_paths(&units, &config, &RunOptions::default()).unwrap();
        assert_eq!(run.result.total, 0);
        assert!(run.result.paths.is_empty());
    }

    #[test]
    fn test_whole_trajectory_mode() {
        let units = vec![
            a_to_b("1", 8, 39.90),
            a_to_b("2", 10, 39.90),
            WorkUnit::Samples {
                label: "3".to_string(),
                samples: vec![sample("3", 8, 0, 116.31, 39.91)],
            },
        ];
        let config = FrequentPathConfig {
            min_distance_m: 0.0,
            ..FrequentPathConfig::default()
        };
        let run = mine_frequent_paths(&units, &config, &RunOptions::default()).unwrap();
        assert_eq!(run.result.total, 1);
        assert_eq!(run.result.paths[0].count, 2);
        assert_eq!(run.result.paths[0].path.len(), 4);
    }

    #[test]
    fn test_output_is_gcj02() {
        let run = mine_frequent_paths(&[a_to_b("1", 8, 39.90)], &config(), &RunOptions::default()).unwrap();
        let first = run.result.paths[0].path[0];
        let (lng, lat) = wgs84_to_gcj02(116.31, 39.91);
        assert_eq!(first, LngLat::new(lng, lat));
    }

    #[test]
    fn test_config_validation() {
        let one_area = FrequentPathConfig {
            area_a: Some(area_a()),
            ..FrequentPathConfig::default()
        };
        assert!(one_area.validate().is_err());
        assert!(FrequentPathConfig { top_k: 0, ..FrequentPathConfig::default() }.validate().is_err());
        assert!(FrequentPathConfig { min_distance_m: -1.0, ..FrequentPathConfig::default() }.validate().is_err());
        assert!(FrequentPathConfig::default().validate().is_ok());
    }

    #[test]
    fn test_merge_is_order_independent() {
        let analysis = FrequentPathAnalysis {
            mode: None,
            grid_size: 0.001,
            min_distance_m: 0.0,
        };
        let parts: Vec<FrequentPathPartial> = ["1", "2", "3"]
            .iter()
            .map(|v| match a_to_b(v, 8, 39.90) {
                WorkUnit::Samples { samples, .. } => analysis.analyze_unit(&samples),
                WorkUnit::File(_) => unreachable!(),
            })
            .collect();

        let mut forward = FrequentPathPartial::default();
        for p in parts.iter().cloned() {
            forward.merge(p);
        }
        let mut backward = FrequentPathPartial::default();
        for p in parts.into_iter().rev() {
            backward.merge(p);
        }
        assert_eq!(forward, backward);
    }
}
