//! Point-density heatmap.
//!
//! Every valid sample is moved to GCJ02 and counted in a square grid cell
//! anchored at `(0, 0)`. Optionally restricted to one hour of the day and to
//! a bounding rectangle, and optionally broken down per hour.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{validate_cell_size, validate_hour, HOURS};
use crate::aggregate::{run_analysis, Analysis, AnalysisRun, PartialAggregate, RunOptions};
use crate::coord::{wgs84_to_gcj02, CoordFrame};
use crate::error::Result;
use crate::geo_utils::compute_bounds;
use crate::region::{cell_center, grid_cell, GridCell, Rectangle};
use crate::source::WorkUnit;
use crate::{LngLat, Sample};

/// Configuration for heatmap generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Grid cell size in GCJ02 degrees (default: 0.01)
    pub cell_size: f64,
    /// Only count samples recorded in this hour of the day
    pub target_hour: Option<u32>,
    /// Only count samples inside these bounds
    pub bounds: Option<Rectangle>,
    /// Also report one grid per hour of the day
    pub by_hour: bool,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_size: 0.01,
            target_hour: None,
            bounds: None,
            by_hour: false,
        }
    }
}

impl HeatmapConfig {
    pub fn validate(&self) -> Result<()> {
        validate_cell_size("heatmap cell size", self.cell_size)?;
        if let Some(hour) = self.target_hour {
            validate_hour(hour)?;
        }
        if let Some(bounds) = &self.bounds {
            bounds.normalized()?;
        }
        Ok(())
    }
}

/// A single non-empty cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub col: i64,
    pub row: i64,
    /// Cell center (GCJ02)
    pub center_lng: f64,
    pub center_lat: f64,
    /// Samples counted in the cell
    pub count: u64,
    /// `count / max_count` of the grid the cell belongs to, in (0, 1]
    pub density: f64,
}

/// Cells of one hour of the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyHeatmap {
    pub hour: u32,
    pub cells: Vec<HeatmapCell>,
    pub max_count: u64,
}

/// Complete heatmap result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapResult {
    pub cell_size: f64,
    /// Non-empty cells only, ordered by `(row, col)`
    pub cells: Vec<HeatmapCell>,
    /// Per-hour grids, present when requested
    pub hourly: Option<Vec<HourlyHeatmap>>,
    pub max_count: u64,
    pub total_points: u64,
}

/// Counts keyed by `(hour, cell)`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HeatmapPartial {
    counts: HashMap<(u32, GridCell), u64>,
}

impl PartialAggregate for HeatmapPartial {
    fn merge(&mut self, other: Self) {
        for (key, count) in other.counts {
            *self.counts.entry(key).or_insert(0) += count;
        }
    }
}

struct HeatmapAnalysis {
    cell_size: f64,
    target_hour: Option<u32>,
    bounds: Option<Rectangle>,
}

impl HeatmapAnalysis {
    fn accepts(&self, sample: &Sample) -> bool {
        if self.target_hour.is_some_and(|h| h != sample.hour()) {
            return false;
        }
        match &self.bounds {
            Some(bounds) => {
                let (lng, lat) = bounds.frame.project(sample.lng, sample.lat);
                bounds.contains(lng, lat)
            }
            None => true,
        }
    }
}

impl Analysis for HeatmapAnalysis {
    type Partial = HeatmapPartial;

    fn name(&self) -> &'static str {
        "heatmap"
    }

    fn analyze_unit(&self, samples: &[Sample]) -> HeatmapPartial {
        let origin = LngLat::new(0.0, 0.0);
        let mut partial = HeatmapPartial::default();
        for sample in samples.iter().filter(|s| self.accepts(s)) {
            let (lng, lat) = wgs84_to_gcj02(sample.lng, sample.lat);
            let cell = grid_cell(lng, lat, origin, self.cell_size);
            *partial.counts.entry((sample.hour(), cell)).or_insert(0) += 1;
        }
        partial
    }
}

/// Turn raw cell counts into sorted cells with normalized density.
fn build_cells(counts: HashMap<GridCell, u64>, cell_size: f64) -> (Vec<HeatmapCell>, u64) {
    let origin = LngLat::new(0.0, 0.0);
    let max_count = counts.values().copied().max().unwrap_or(0);

    let mut cells: Vec<HeatmapCell> = counts
        .into_iter()
        .map(|(cell, count)| {
            let center = cell_center(cell, origin, cell_size);
            HeatmapCell {
                col: cell.col,
                row: cell.row,
                center_lng: center.lng,
                center_lat: center.lat,
                count,
                density: count as f64 / max_count as f64,
            }
        })
        .collect();
    cells.sort_by_key(|c| (c.row, c.col));
    (cells, max_count)
}

fn build_result(partial: HeatmapPartial, config: &HeatmapConfig) -> HeatmapResult {
    let mut overall: HashMap<GridCell, u64> = HashMap::new();
    let mut per_hour: Vec<HashMap<GridCell, u64>> = vec![HashMap::new(); HOURS];
    let mut total_points = 0;

    for ((hour, cell), count) in partial.counts {
        total_points += count;
        *overall.entry(cell).or_insert(0) += count;
        if config.by_hour {
            *per_hour[hour as usize].entry(cell).or_insert(0) += count;
        }
    }

    let hourly = config.by_hour.then(|| {
        per_hour
            .into_iter()
            .enumerate()
            .map(|(hour, counts)| {
                let (cells, max_count) = build_cells(counts, config.cell_size);
                HourlyHeatmap {
                    hour: hour as u32,
                    cells,
                    max_count,
                }
            })
            .collect()
    });
    let (cells, max_count) = build_cells(overall, config.cell_size);

    HeatmapResult {
        cell_size: config.cell_size,
        cells,
        hourly,
        max_count,
        total_points,
    }
}

/// Count samples per GCJ02 grid cell across all units.
pub fn generate_heatmap(
    units: &[WorkUnit],
    config: &HeatmapConfig,
    options: &RunOptions,
) -> Result<AnalysisRun<HeatmapResult>> {
    config.validate()?;
    let analysis = HeatmapAnalysis {
        cell_size: config.cell_size,
        target_hour: config.target_hour,
        bounds: config.bounds.map(|b| b.normalized()).transpose()?,
    };
    Ok(run_analysis(&analysis, units, options)?.map(|partial| build_result(partial, config)))
}

/// Cell of `heatmap` containing a GCJ02 location, if that cell is non-empty.
pub fn query_heatmap_cell(heatmap: &HeatmapResult, lng: f64, lat: f64) -> Option<&HeatmapCell> {
    let target = grid_cell(lng, lat, LngLat::new(0.0, 0.0), heatmap.cell_size);
    heatmap
        .cells
        .binary_search_by_key(&(target.row, target.col), |c| (c.row, c.col))
        .ok()
        .map(|i| &heatmap.cells[i])
}

/// Bounds of a heatmap's non-empty cells (GCJ02), `None` when empty.
pub fn heatmap_extent(heatmap: &HeatmapResult) -> Option<Rectangle> {
    let half = heatmap.cell_size / 2.0;
    let centers = heatmap.cells.iter().map(|c| LngLat::new(c.center_lng, c.center_lat));
    let mut rect = compute_bounds(centers, CoordFrame::Gcj02)?;
    rect.min_lng -= half;
    rect.max_lng += half;
    rect.min_lat -= half;
    rect.max_lat += half;
    Some(rect)
}
