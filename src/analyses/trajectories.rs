//! Trajectory retrieval.
//!
//! Loads the requested vehicles' logs in parallel, cleans each trajectory
//! (deduplication, optional simplification, both on raw WGS84 points) and
//! returns it in the display frame.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::aggregate::{run_analysis, Analysis, AnalysisRun, PartialAggregate, RunOptions};
use crate::cleaning::{clean_with, CleanConfig};
use crate::error::{Result, TrajectoryError};
use crate::geo_utils::polyline_length;
use crate::source::{list_vehicle_ids, units_for_vehicles, vehicle_runs};
use crate::{Sample, Trajectory};

/// Which vehicles to retrieve
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleSelection {
    /// Every vehicle in the data directory
    #[default]
    All,
    /// Only these vehicle ids
    Ids(Vec<String>),
}

/// Retrieval request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryQuery {
    pub vehicles: VehicleSelection,
    /// Retrieve a random subset of this many vehicles
    pub sample_count: Option<usize>,
    /// Seed for the random subset; unseeded when absent
    pub seed: Option<u64>,
    pub clean: CleanConfig,
}

impl TrajectoryQuery {
    pub fn validate(&self) -> Result<()> {
        if self.sample_count == Some(0) {
            return Err(TrajectoryError::config("sample_count must be at least 1"));
        }
        self.clean.validate()
    }

    /// Resolve the selection against `data_dir`, applying random sampling.
    /// Returned ids are sorted.
    fn resolve_ids(&self, data_dir: &Path) -> Result<Vec<String>> {
        let mut ids = match &self.vehicles {
            VehicleSelection::All => list_vehicle_ids(data_dir, "", usize::MAX)?,
            VehicleSelection::Ids(ids) => ids.clone(),
        };
        ids.sort();
        ids.dedup();

        if let Some(n) = self.sample_count.filter(|&n| n < ids.len()) {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            ids = ids.choose_multiple(&mut rng, n).cloned().collect();
            ids.sort();
        }
        Ok(ids)
    }
}

/// Cleaned trajectories keyed by vehicle id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrajectoryPartial {
    trajectories: BTreeMap<String, Trajectory>,
}

impl PartialAggregate for TrajectoryPartial {
    fn merge(&mut self, other: Self) {
        for (id, trajectory) in other.trajectories {
            match self.trajectories.get_mut(&id) {
                Some(existing) => {
                    existing.points.extend(trajectory.points);
                    existing.points.sort_by_key(|p| p.timestamp);
                }
                None => {
                    self.trajectories.insert(id, trajectory);
                }
            }
        }
    }
}

struct TrajectoryAnalysis {
    clean: CleanConfig,
}

impl Analysis for TrajectoryAnalysis {
    type Partial = TrajectoryPartial;

    fn name(&self) -> &'static str {
        "trajectories"
    }

    fn analyze_unit(&self, samples: &[Sample]) -> TrajectoryPartial {
        let mut partial = TrajectoryPartial::default();
        for run in vehicle_runs(samples) {
            let raw = Trajectory::new(run[0].vehicle_id.clone(), run.to_vec());
            let cleaned = clean_with(&raw, &self.clean).to_display_frame();
            debug!(
                "[trajectories] {}: {} -> {} points, {:.0} m",
                raw.vehicle_id,
                raw.len(),
                cleaned.len(),
                polyline_length(&cleaned.points)
            );
            partial.merge(TrajectoryPartial {
                trajectories: BTreeMap::from([(cleaned.vehicle_id.clone(), cleaned)]),
            });
        }
        partial
    }
}

/// Retrieve cleaned GCJ02 trajectories, ordered by vehicle id.
///
/// Vehicles whose log holds no valid sample are omitted. A requested id with
/// no log file is reported as a failed unit.
pub fn retrieve_trajectories(
    data_dir: &Path,
    query: &TrajectoryQuery,
    options: &RunOptions,
) -> Result<AnalysisRun<Vec<Trajectory>>> {
    query.validate()?;
    let ids = query.resolve_ids(data_dir)?;
    info!("[trajectories] retrieving {} vehicles from {}", ids.len(), data_dir.display());

    let units = units_for_vehicles(data_dir, &ids);
    let analysis = TrajectoryAnalysis {
        clean: query.clean.clone(),
    };
    Ok(run_analysis(&analysis, &units, options)?.map(|p| p.trajectories.into_values().collect()))
}
