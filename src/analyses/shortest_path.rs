//! Shortest A→B transit per hour of the day.
//!
//! Each vehicle's first completed A→B segment is a candidate, bucketed by
//! the hour of the sample that reached B. Later transits of the same vehicle
//! are ignored. Each hour keeps the smallest travel time, how many
//! segments achieved exactly that time, and one winning path.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{indexed_region, HOURS};
use crate::aggregate::{run_analysis, Analysis, AnalysisRun, PartialAggregate, RunOptions};
use crate::analyzer::{CompletedSegment, RegionMode, TransitionAnalyzer, TransitionEvent};
use crate::coord::CoordFrame;
use crate::error::Result;
use crate::region::Rectangle;
use crate::source::WorkUnit;
use crate::{LngLat, Sample};

/// How a segment's travel time is measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelTimeMetric {
    /// Elapsed minutes from entry to exit
    #[default]
    Minutes,
    /// Number of samples in the segment, for logs sampled about once a minute
    PointCount,
}

impl TravelTimeMetric {
    fn measure(self, segment: &CompletedSegment<'_>) -> f64 {
        match self {
            TravelTimeMetric::Minutes => segment.duration_minutes(),
            TravelTimeMetric::PointCount => segment.path.len() as f64,
        }
    }
}

/// Configuration for shortest path analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortestPathConfig {
    pub area_a: Rectangle,
    pub area_b: Rectangle,
    #[serde(default)]
    pub metric: TravelTimeMetric,
}

impl ShortestPathConfig {
    pub fn new(area_a: Rectangle, area_b: Rectangle) -> Self {
        Self {
            area_a,
            area_b,
            metric: TravelTimeMetric::default(),
        }
    }
}

/// Best transit of one hour of the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyShortestPath {
    pub hour: u32,
    /// Winning path (GCJ02), `None` when no segment ended in this hour
    pub path: Option<Vec<LngLat>>,
    pub travel_time: Option<f64>,
    /// Segments that achieved `travel_time`
    pub sample_count: u64,
}

/// Shortest transit per hour, always 24 entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortestPathResult {
    pub hours: Vec<HourlyShortestPath>,
}

#[derive(Debug, Clone, PartialEq)]
struct HourBest {
    travel_time: f64,
    sample_count: u64,
    entry_time: NaiveDateTime,
    vehicle_id: String,
    path: Vec<LngLat>,
}

impl HourBest {
    fn rank(&self) -> (NaiveDateTime, &str) {
        (self.entry_time, &self.vehicle_id)
    }
}

/// Best candidate per hour.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPathPartial {
    hours: Vec<Option<HourBest>>,
}

impl Default for ShortestPathPartial {
    fn default() -> Self {
        Self {
            hours: vec![None; HOURS],
        }
    }
}

impl ShortestPathPartial {
    fn offer(&mut self, hour: usize, candidate: HourBest) {
        match &mut self.hours[hour] {
            Some(best) if candidate.travel_time == best.travel_time => {
                let sample_count = best.sample_count + candidate.sample_count;
                if candidate.rank() < best.rank() {
                    *best = candidate;
                }
                best.sample_count = sample_count;
            }
            Some(best) if candidate.travel_time > best.travel_time => {}
            slot => *slot = Some(candidate),
        }
    }
}

impl PartialAggregate for ShortestPathPartial {
    fn merge(&mut self, other: Self) {
        for (hour, best) in other.hours.into_iter().enumerate() {
            if let Some(best) = best {
                self.offer(hour, best);
            }
        }
    }
}

impl From<ShortestPathPartial> for ShortestPathResult {
    fn from(partial: ShortestPathPartial) -> Self {
        let hours = partial
            .hours
            .into_iter()
            .enumerate()
            .map(|(hour, best)| match best {
                Some(best) => HourlyShortestPath {
                    hour: hour as u32,
                    path: Some(best.path),
                    travel_time: Some(best.travel_time),
                    sample_count: best.sample_count,
                },
                None => HourlyShortestPath {
                    hour: hour as u32,
                    path: None,
                    travel_time: None,
                    sample_count: 0,
                },
            })
            .collect();
        ShortestPathResult { hours }
    }
}

struct ShortestPathAnalysis {
    mode: RegionMode,
    metric: TravelTimeMetric,
}

impl Analysis for ShortestPathAnalysis {
    type Partial = ShortestPathPartial;

    fn name(&self) -> &'static str {
        "shortest_path"
    }

    fn analyze_unit(&self, samples: &[Sample]) -> ShortestPathPartial {
        let mut partial = ShortestPathPartial::default();
        let mut analyzer = TransitionAnalyzer::new(self.mode.clone());
        let mut closed: Option<String> = None;
        analyzer.run(samples, &mut |event: TransitionEvent<'_>| {
            if let TransitionEvent::Completed(segment) = event {
                // Only a vehicle's first transit counts
                if closed.as_deref() == Some(segment.vehicle_id()) {
                    return;
                }
                closed = Some(segment.vehicle_id().to_string());
                let entry = segment.entry();
                partial.offer(
                    segment.exit().hour() as usize,
                    HourBest {
                        travel_time: self.metric.measure(&segment),
                        sample_count: 1,
                        entry_time: entry.timestamp,
                        vehicle_id: entry.vehicle_id.clone(),
                        path: segment
                            .path
                            .iter()
                            .map(|s| s.projected(CoordFrame::Gcj02).lng_lat())
                            .collect(),
                    },
                );
            }
        });
        partial
    }
}

/// Find the fastest A→B transit for every hour of the day.
pub fn analyze_shortest_paths(
    units: &[WorkUnit],
    config: &ShortestPathConfig,
    options: &RunOptions,
) -> Result<AnalysisRun<ShortestPathResult>> {
    let analysis = ShortestPathAnalysis {
        mode: RegionMode::Pair {
            start: indexed_region(config.area_a)?,
            end: indexed_region(config.area_b)?,
        },
        metric: config.metric,
    };
    Ok(run_analysis(&analysis, units, options)?.map(ShortestPathResult::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample;

    fn config() -> ShortestPathConfig {
        ShortestPathConfig::new(
            Rectangle::new(116.30, 116.32, 39.90, 39.92, CoordFrame::Wgs84),
            Rectangle::new(116.35, 116.37, 39.88, 39.90, CoordFrame::Wgs84),
        )
    }

    /// Vehicle enters A at `hour:start` and reaches B `minutes` later.
    fn transit(vehicle: &str, hour: u32, start: u32, minutes: u32) -> WorkUnit {
        WorkUnit::Samples {
            label: vehicle.to_string(),
            samples: vec![
                sample(vehicle, hour, start, 116.31, 39.91),
                sample(vehicle, hour, start + 1, 116.33, 39.905),
                sample(vehicle, hour, start + minutes, 116.36, 39.89),
            ],
        }
    }

    #[test]
    fn test_ties_and_replacement() {
        let mut units = vec![transit("1", 8, 10, 5), transit("2", 8, 20, 5)];
        let run = analyze_shortest_paths(&units, &config(), &RunOptions::default()).unwrap();
        let hour = &run.result.hours[8];
        assert_eq!(hour.travel_time, Some(5.0));
        assert_eq!(hour.sample_count, 2);

        units.push(transit("3", 8, 30, 4));
        let run = analyze_shortest_paths(&units, &config(), &RunOptions::default()).unwrap();
        let hour = &run.result.hours[8];
        assert_eq!(hour.travel_time, Some(4.0));
        assert_eq!(hour.sample_count, 1);
    }

    #[test]
    fn test_empty_hours_are_values() {
        let run = analyze_shortest_paths(&[transit("1", 8, 10, 5)], &config(), &RunOptions::default()).unwrap();
        assert_eq!(run.result.hours.len(), 24);
        let empty = &run.result.hours[3];
        assert!(empty.path.is_none());
        assert!(empty.travel_time.is_none());
        assert_eq!(empty.sample_count, 0);
    }

    #[test]
    fn test_bucketed_by_exit_hour() {
        let unit = WorkUnit::Samples {
            label: "1".to_string(),
            samples: vec![
                sample("1", 8, 50, 116.31, 39.91),
                sample("1", 8, 55, 116.33, 39.905),
                sample("1", 9, 5, 116.36, 39.89),
            ],
        };
        let run = analyze_shortest_paths(&[unit], &config(), &RunOptions::default()).unwrap();
        assert!(run.result.hours[8].travel_time.is_none());
        assert_eq!(run.result.hours[9].travel_time, Some(15.0));
    }

    #[test]
    fn test_point_count_metric() {
        let config = ShortestPathConfig {
            metric: TravelTimeMetric::PointCount,
            ..config()
        };
        let run = analyze_shortest_paths(&[transit("1", 8, 10, 5)], &config, &RunOptions::default()).unwrap();
        assert_eq!(run.result.hours[8].travel_time, Some(3.0));
        assert_eq!(run.result.hours[8].path.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_winning_path_is_deterministic() {
        // Equal times: the earliest entry supplies the path regardless of order
        let a = transit("9", 8, 10, 5);
        let b = transit("1", 8, 20, 5);
        let forward = analyze_shortest_paths(&[a.clone(), b.clone()], &config(), &RunOptions::with_workers(1)).unwrap();
        let backward = analyze_shortest_paths(&[b, a], &config(), &RunOptions::with_workers(1)).unwrap();
        assert_eq!(forward.result, backward.result);
    }

    #[test]
    fn test_only_first_transit_per_vehicle_counts() {
        // Vehicle 1 crosses twice in hour 8, the second time faster
        let samples = vec![
            sample("1", 8, 0, 116.31, 39.91),
            sample("1", 8, 5, 116.36, 39.89),
            sample("1", 8, 10, 116.31, 39.91),
            sample("1", 8, 12, 116.36, 39.89),
            sample("2", 8, 20, 116.31, 39.91),
            sample("2", 8, 25, 116.36, 39.89),
        ];
        let unit = WorkUnit::Samples {
            label: "fleet".to_string(),
            samples,
        };
        let run = analyze_shortest_paths(&[unit], &config(), &RunOptions::default()).unwrap();
        assert_eq!(run.result.hours[8].travel_time, Some(5.0));
        assert_eq!(run.result.hours[8].sample_count, 2);
    }

    #[test]
    fn test_metric_names() {
        let metric: TravelTimeMetric = serde_json::from_str("\"point_count\"").unwrap();
        assert_eq!(metric, TravelTimeMetric::PointCount);
    }
}
