//! # Parallel Aggregation Framework
//!
//! Runs an [`Analysis`] over many [`WorkUnit`]s on a bounded rayon pool and
//! merges the per-unit partial results.
//!
//! ## Model
//!
//! 1. Every unit is loaded and analyzed on its own by one worker, producing
//!    a [`PartialAggregate`]. Workers share nothing mutable.
//! 2. When all units are done, the partials are merged on the calling
//!    thread. Merges are associative and commutative, so the result does not
//!    depend on the number of workers or on completion order.
//!
//! A unit that fails to load contributes nothing and is listed in
//! [`AnalysisRun::failures`]; it is not retried. Cancelling the
//! [`CancellationToken`] skips units that have not started yet while
//! in-flight units finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrajectoryError};
use crate::source::WorkUnit;
use crate::Sample;

/// Accumulator produced per unit and merged afterwards.
///
/// `merge` must be associative and commutative.
pub trait PartialAggregate: Default + Send {
    fn merge(&mut self, other: Self);
}

/// A per-unit computation.
pub trait Analysis: Sync {
    type Partial: PartialAggregate;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Analyze one unit's samples (WGS84, time-ordered per vehicle).
    fn analyze_unit(&self, samples: &[Sample]) -> Self::Partial;
}

/// Shared flag to abandon queued units.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Execution options for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Worker threads, capped at the available hardware parallelism.
    /// Default: available parallelism
    pub workers: Option<usize>,
    /// Cancellation handle owned by the caller
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl RunOptions {
    /// Options with a fixed worker count.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: Some(workers),
            cancellation: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(TrajectoryError::config("workers must be at least 1"));
        }
        Ok(())
    }

    /// Worker count actually used.
    pub fn effective_workers(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.workers.map_or(available, |w| w.clamp(1, available))
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// A unit that could not be processed.
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: String,
    pub error: TrajectoryError,
}

/// Run metadata reported alongside every result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub units_total: usize,
    pub units_processed: usize,
    pub units_failed: usize,
    pub units_cancelled: usize,
    pub workers_used: usize,
    pub elapsed_ms: u64,
}

/// Merged result of a run plus its metadata.
#[derive(Debug)]
pub struct AnalysisRun<P> {
    pub result: P,
    pub summary: RunSummary,
    pub failures: Vec<UnitFailure>,
}

impl<P> AnalysisRun<P> {
    /// Convert the merged partial into a final result, keeping the metadata.
    pub fn map<R>(self, f: impl FnOnce(P) -> R) -> AnalysisRun<R> {
        AnalysisRun {
            result: f(self.result),
            summary: self.summary,
            failures: self.failures,
        }
    }
}

enum UnitOutcome<P> {
    Done(P),
    Failed(UnitFailure),
    Skipped,
}

fn process_unit<A: Analysis>(analysis: &A, unit: &WorkUnit, options: &RunOptions) -> UnitOutcome<A::Partial> {
    if options.is_cancelled() {
        return UnitOutcome::Skipped;
    }
    let start = Instant::now();
    match unit.load() {
        Ok(samples) => {
            let partial = analysis.analyze_unit(&samples);
            debug!(
                "[{}] unit {} ({} samples) in {:?}",
                analysis.name(),
                unit.label(),
                samples.len(),
                start.elapsed()
            );
            UnitOutcome::Done(partial)
        }
        Err(error) => {
            warn!("[{}] skipping unit {}: {}", analysis.name(), unit.label(), error);
            UnitOutcome::Failed(UnitFailure {
                unit: unit.label(),
                error,
            })
        }
    }
}

/// Run `analysis` over `units` in parallel and merge the partials.
///
/// Fails only on invalid options, pool creation failure, or a token that was
/// already cancelled before the run started. Unit failures are reported in
/// the returned [`AnalysisRun`].
pub fn run_analysis<A: Analysis>(
    analysis: &A,
    units: &[WorkUnit],
    options: &RunOptions,
) -> Result<AnalysisRun<A::Partial>> {
    options.validate()?;
    if options.is_cancelled() {
        return Err(TrajectoryError::Cancelled);
    }

    let workers = options.effective_workers();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("trajectory-worker-{}", i))
        .build()
        .map_err(|e| TrajectoryError::WorkerPool {
            message: e.to_string(),
        })?;

    info!(
        "[{}] processing {} units on {} workers",
        analysis.name(),
        units.len(),
        workers
    );
    let start = Instant::now();

    let outcomes: Vec<UnitOutcome<A::Partial>> = pool.install(|| {
        units
            .par_iter()
            .map(|unit| process_unit(analysis, unit, options))
            .collect()
    });

    let mut result = A::Partial::default();
    let mut failures = Vec::new();
    let mut summary = RunSummary {
        units_total: units.len(),
        workers_used: workers,
        ..RunSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            UnitOutcome::Done(partial) => {
                result.merge(partial);
                summary.units_processed += 1;
            }
            UnitOutcome::Failed(failure) => failures.push(failure),
            UnitOutcome::Skipped => summary.units_cancelled += 1,
        }
    }
    summary.units_failed = failures.len();
    summary.elapsed_ms = duration_ms(start.elapsed());

    info!(
        "[{}] done: {} processed, {} failed, {} cancelled in {}ms",
        analysis.name(),
        summary.units_processed,
        summary.units_failed,
        summary.units_cancelled,
        summary.elapsed_ms
    );

    Ok(AnalysisRun {
        result,
        summary,
        failures,
    })
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample;
    use std::path::PathBuf;

    #[derive(Default, Debug, PartialEq)]
    struct Count(u64);

    impl PartialAggregate for Count {
        fn merge(&mut self, other: Self) {
            self.0 += other.0;
        }
    }

    struct CountSamples;

    impl Analysis for CountSamples {
        type Partial = Count;

        fn name(&self) -> &'static str {
            "count"
        }

        fn analyze_unit(&self, samples: &[Sample]) -> Count {
            Count(samples.len() as u64)
        }
    }

    fn memory_unit(id: &str, n: u32) -> WorkUnit {
        WorkUnit::Samples {
            label: id.to_string(),
            samples: (0..n).map(|i| sample(id, 8, i, 116.3, 39.9)).collect(),
        }
    }

    #[test]
    fn test_merges_all_units() {
        let units: Vec<WorkUnit> = (1..=20).map(|i| memory_unit(&i.to_string(), i)).collect();
        let run = run_analysis(&CountSamples, &units, &RunOptions::default()).unwrap();
        assert_eq!(run.result, Count(210));
        assert_eq!(run.summary.units_processed, 20);
        assert!(run.failures.is_empty());
    }

    #[test]
    fn test_failed_unit_is_isolated() {
        let units = vec![
            memory_unit("1", 3),
            WorkUnit::File(PathBuf::from("/missing/vehicle.txt")),
            memory_unit("2", 4),
        ];
        let run = run_analysis(&CountSamples, &units, &RunOptions::with_workers(2)).unwrap();
        assert_eq!(run.result, Count(7));
        assert_eq!(run.summary.units_failed, 1);
        assert_eq!(run.failures[0].unit, "/missing/vehicle.txt");
        assert!(matches!(run.failures[0].error, TrajectoryError::Io { .. }));
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let units: Vec<WorkUnit> = (1..=30).map(|i| memory_unit(&i.to_string(), i % 7)).collect();
        let one = run_analysis(&CountSamples, &units, &RunOptions::with_workers(1)).unwrap();
        let many = run_analysis(&CountSamples, &units, &RunOptions::with_workers(8)).unwrap();
        assert_eq!(one.result, many.result);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = run_analysis(&CountSamples, &[], &RunOptions::with_workers(0)).unwrap_err();
        assert!(matches!(err, TrajectoryError::InvalidConfig { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let options = RunOptions {
            workers: Some(2),
            cancellation: Some(token),
        };
        let err = run_analysis(&CountSamples, &[memory_unit("1", 1)], &options).unwrap_err();
        assert!(matches!(err, TrajectoryError::Cancelled));
    }

    #[test]
    fn test_cancel_mid_run_skips_queued_units() {
        struct CancelAfterFirst(CancellationToken);

        impl Analysis for CancelAfterFirst {
            type Partial = Count;

            fn name(&self) -> &'static str {
                "cancel"
            }

            fn analyze_unit(&self, samples: &[Sample]) -> Count {
                self.0.cancel();
                Count(samples.len() as u64)
            }
        }

        let token = CancellationToken::new();
        let options = RunOptions {
            workers: Some(1),
            cancellation: Some(token.clone()),
        };
        let units: Vec<WorkUnit> = (1..=10).map(|i| memory_unit(&i.to_string(), 1)).collect();
        let run = run_analysis(&CancelAfterFirst(token), &units, &options).unwrap();
        assert!(run.summary.units_processed >= 1);
        assert_eq!(run.summary.units_processed + run.summary.units_cancelled, 10);
        assert!(run.summary.units_cancelled > 0);
    }

    #[test]
    fn test_effective_workers_is_capped() {
        let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(RunOptions::with_workers(10_000).effective_workers(), available);
        assert_eq!(RunOptions::default().effective_workers(), available);
    }
}
