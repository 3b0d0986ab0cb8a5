//! Input sources and units of work.
//!
//! The usual source is a data directory holding one `<vehicle_id>.txt` log
//! per vehicle. Rows that come from elsewhere (a database query, the
//! [`RegionQueryIndex`](crate::RegionQueryIndex)) are wrapped into
//! in-memory units so that every analysis treats both alike.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrajectoryError};
use crate::parser::read_samples;
use crate::Sample;

/// Extension of vehicle log files.
const LOG_EXTENSION: &str = "txt";

/// One unit of work for the aggregation framework.
///
/// A file unit is exactly one vehicle's trajectory. A sample unit may hold
/// several vehicles back to back, each time-ordered.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    /// A vehicle log file, read when the unit runs
    File(PathBuf),
    /// Samples already in memory (WGS84)
    Samples { label: String, samples: Vec<Sample> },
}

impl WorkUnit {
    /// Human-readable name used in logs and failure reports.
    pub fn label(&self) -> String {
        match self {
            WorkUnit::File(path) => path.display().to_string(),
            WorkUnit::Samples { label, .. } => label.clone(),
        }
    }

    /// The unit's valid samples. Reading a file may fail; in-memory units never do.
    pub fn load(&self) -> Result<Cow<'_, [Sample]>> {
        match self {
            WorkUnit::File(path) => read_samples(path).map(Cow::Owned),
            WorkUnit::Samples { samples, .. } => Ok(Cow::Borrowed(samples.as_slice())),
        }
    }
}

/// Vehicle id of a log file: its file stem.
fn vehicle_id_of(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

/// All vehicle log files in `dir`, sorted by path.
///
/// Fails when the directory is missing or unreadable.
pub fn list_vehicle_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| TrajectoryError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| TrajectoryError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == LOG_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Ids of vehicles in `dir` whose id contains `keyword`, at most `limit`.
pub fn list_vehicle_ids(dir: &Path, keyword: &str, limit: usize) -> Result<Vec<String>> {
    Ok(list_vehicle_files(dir)?
        .iter()
        .filter_map(|p| vehicle_id_of(p))
        .filter(|id| id.contains(keyword))
        .take(limit)
        .collect())
}

/// One file unit per vehicle log in `dir`.
pub fn units_from_dir(dir: &Path) -> Result<Vec<WorkUnit>> {
    Ok(list_vehicle_files(dir)?.into_iter().map(WorkUnit::File).collect())
}

/// File units for specific vehicles. A missing file surfaces as a failed
/// unit when the analysis runs, not here.
pub fn units_for_vehicles<S: AsRef<str>>(dir: &Path, vehicle_ids: &[S]) -> Vec<WorkUnit> {
    vehicle_ids
        .iter()
        .map(|id| WorkUnit::File(dir.join(format!("{}.{}", id.as_ref(), LOG_EXTENSION))))
        .collect()
}

/// Consecutive runs of samples sharing a vehicle id.
pub(crate) fn vehicle_runs(samples: &[Sample]) -> Vec<&[Sample]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=samples.len() {
        if i == samples.len() || samples[i].vehicle_id != samples[start].vehicle_id {
            runs.push(&samples[start..i]);
            start = i;
        }
    }
    runs
}

/// Split rows ordered by vehicle into one in-memory unit per vehicle run.
pub fn units_from_samples(samples: Vec<Sample>) -> Vec<WorkUnit> {
    let mut units: Vec<WorkUnit> = Vec::new();
    for sample in samples {
        match units.last_mut() {
            Some(WorkUnit::Samples { label, samples }) if *label == sample.vehicle_id => {
                samples.push(sample)
            }
            _ => units.push(WorkUnit::Samples {
                label: sample.vehicle_id.clone(),
                samples: vec![sample],
            }),
        }
    }
    units
}
