//! # Region Transition Analyzer
//!
//! A per-vehicle state machine over time-ordered samples that reports
//! region boundary crossings and completed start→end segments.
//!
//! ## States
//!
//! - `Outside`: not inside a segment.
//! - `Dwelling`: single mode only, inside the region. Only a sample count
//!   is kept.
//! - `InSegment`: pair mode only, a segment was opened when the vehicle
//!   entered region A; every following sample is appended to its path.
//!
//! In [`RegionMode::Single`] a segment is the dwell inside the region and
//! closes when the vehicle leaves. In [`RegionMode::Pair`] a segment opens
//! in region A and closes at the first later sample inside region B, which
//! emits [`TransitionEvent::Completed`].
//!
//! Independently of segments, boundary crossings between consecutive samples
//! are reported as [`TransitionEvent::FlowIn`] / [`TransitionEvent::FlowOut`].
//! Crossings are edge-triggered: they compare the previous sample's
//! membership with the current one. When A and B overlap, a move that is
//! both A→B and B→A is reported as `FlowOut`.
//!
//! A change of vehicle id resets everything. State never carries over from
//! one vehicle to the next.
//!
//! ## Example
//!
//! ```rust
//! use trajectory_engine::{parse_line, CoordFrame, Rectangle, Region};
//! use trajectory_engine::{RegionMode, TransitionAnalyzer, TransitionEvent};
//!
//! let area = Region::new(Rectangle::new(116.30, 116.40, 39.90, 40.00, CoordFrame::Wgs84)).unwrap();
//! let mut analyzer = TransitionAnalyzer::new(RegionMode::Single(area));
//!
//! let mut exits = 0;
//! let mut sink = |event: TransitionEvent<'_>| {
//!     if matches!(event, TransitionEvent::FlowOut { .. }) {
//!         exits += 1;
//!     }
//! };
//! for line in ["7,2008-02-02 08:00:00,116.35,39.95", "7,2008-02-02 08:05:00,116.45,39.95"] {
//!     analyzer.process(&parse_line(line).unwrap(), &mut sink);
//! }
//! assert_eq!(exits, 1);
//! ```

use chrono::NaiveDateTime;

use crate::region::Region;
use crate::Sample;

/// Which regions drive the state machine.
#[derive(Debug, Clone)]
pub enum RegionMode {
    /// One watched region: crossings in and out of it.
    Single(Region),
    /// Segments from `start` to `end`; crossings are A→B (out) and B→A (in).
    Pair { start: Region, end: Region },
}

/// A closed start→end segment.
#[derive(Debug, Clone, Copy)]
pub struct CompletedSegment<'a> {
    /// Every sample from the entry sample to the exit sample, inclusive (WGS84)
    pub path: &'a [Sample],
}

impl<'a> CompletedSegment<'a> {
    /// Sample that opened the segment inside the start region.
    pub fn entry(&self) -> &'a Sample {
        &self.path[0]
    }

    /// Sample that closed the segment inside the end region.
    pub fn exit(&self) -> &'a Sample {
        &self.path[self.path.len() - 1]
    }

    pub fn vehicle_id(&self) -> &'a str {
        &self.entry().vehicle_id
    }

    /// Elapsed time from entry to exit in minutes.
    pub fn duration_minutes(&self) -> f64 {
        (self.exit().timestamp - self.entry().timestamp).num_seconds() as f64 / 60.0
    }
}

/// Event emitted by [`TransitionAnalyzer::process`].
#[derive(Debug, Clone, Copy)]
pub enum TransitionEvent<'a> {
    /// Boundary crossed inward between the previous and current sample
    FlowIn {
        previous_time: NaiveDateTime,
        current: &'a Sample,
    },
    /// Boundary crossed outward between the previous and current sample
    FlowOut {
        previous_time: NaiveDateTime,
        current: &'a Sample,
    },
    /// A start→end segment closed (pair mode only)
    Completed(CompletedSegment<'a>),
}

/// Receiver of transition events.
pub trait TransitionSink {
    fn on_event(&mut self, event: TransitionEvent<'_>);
}

impl<F> TransitionSink for F
where
    F: FnMut(TransitionEvent<'_>),
{
    fn on_event(&mut self, event: TransitionEvent<'_>) {
        self(event)
    }
}

/// Membership of the previously processed sample.
#[derive(Debug, Clone, Copy)]
struct Previous {
    timestamp: NaiveDateTime,
    in_start: bool,
    in_end: bool,
}

#[derive(Debug, Default)]
enum SegmentState {
    #[default]
    Outside,
    /// Single mode: inside the region, only the sample count is kept
    Dwelling {
        samples: usize,
    },
    /// Pair mode: left A, heading for B
    InSegment {
        path: Vec<Sample>,
    },
}

/// Per-vehicle region transition state machine.
///
/// One instance serves one stream of samples; it resets itself whenever the
/// vehicle id changes.
#[derive(Debug)]
pub struct TransitionAnalyzer {
    mode: RegionMode,
    vehicle_id: Option<String>,
    previous: Option<Previous>,
    state: SegmentState,
}

impl TransitionAnalyzer {
    pub fn new(mode: RegionMode) -> Self {
        Self {
            mode,
            vehicle_id: None,
            previous: None,
            state: SegmentState::Outside,
        }
    }

    /// End of a stream: back to `Outside` with no previous sample. Any open
    /// segment is dropped.
    pub fn finish(&mut self) {
        self.vehicle_id = None;
        self.previous = None;
        self.state = SegmentState::Outside;
    }

    /// True while a segment is open.
    pub fn is_in_segment(&self) -> bool {
        !matches!(self.state, SegmentState::Outside)
    }

    /// Number of samples in the open segment, 0 when outside.
    pub fn segment_len(&self) -> usize {
        match &self.state {
            SegmentState::Outside => 0,
            SegmentState::Dwelling { samples } => *samples,
            SegmentState::InSegment { path } => path.len(),
        }
    }

    /// Feed every sample of a stream, then [`finish`](Self::finish).
    pub fn run<S: TransitionSink + ?Sized>(&mut self, samples: &[Sample], sink: &mut S) {
        for sample in samples {
            self.process(sample, sink);
        }
        self.finish();
    }

    /// Advance the state machine by one sample (WGS84).
    pub fn process<S: TransitionSink + ?Sized>(&mut self, sample: &Sample, sink: &mut S) {
        if self.vehicle_id.as_deref() != Some(sample.vehicle_id.as_str()) {
            self.finish();
            self.vehicle_id = Some(sample.vehicle_id.clone());
        }

        let (in_start, in_end) = match &self.mode {
            RegionMode::Single(region) => (region.contains_sample(sample), false),
            RegionMode::Pair { start, end } => (start.contains_sample(sample), end.contains_sample(sample)),
        };
        let is_pair = matches!(self.mode, RegionMode::Pair { .. });

        if let Some(prev) = self.previous {
            let (flow_out, flow_in) = if is_pair {
                (prev.in_start && in_end, prev.in_end && in_start)
            } else {
                (prev.in_start && !in_start, !prev.in_start && in_start)
            };
            // Inside an A/B overlap both hold; A→B wins
            if flow_out {
                sink.on_event(TransitionEvent::FlowOut {
                    previous_time: prev.timestamp,
                    current: sample,
                });
            } else if flow_in {
                sink.on_event(TransitionEvent::FlowIn {
                    previous_time: prev.timestamp,
                    current: sample,
                });
            }
        }

        self.state = match std::mem::take(&mut self.state) {
            SegmentState::Outside if in_start && is_pair => SegmentState::InSegment {
                path: vec![sample.clone()],
            },
            SegmentState::Outside if in_start => SegmentState::Dwelling { samples: 1 },
            SegmentState::Outside => SegmentState::Outside,
            SegmentState::Dwelling { samples } if in_start => SegmentState::Dwelling { samples: samples + 1 },
            SegmentState::Dwelling { .. } => SegmentState::Outside,
            SegmentState::InSegment { mut path } => {
                path.push(sample.clone());
                if in_end {
                    sink.on_event(TransitionEvent::Completed(CompletedSegment { path: &path }));
                    SegmentState::Outside
                } else {
                    SegmentState::InSegment { path }
                }
            }
        };

        self.previous = Some(Previous {
            timestamp: sample.timestamp,
            in_start,
            in_end,
        });
    }
}
