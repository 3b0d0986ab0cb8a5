//! Hourly region flow.
//!
//! With one area, counts vehicles entering (`flow_in`) and leaving
//! (`flow_out`) it. With two areas, counts direct exchanges between them:
//! area1 → area2 is `flow_out`, area2 → area1 is `flow_in`.
//!
//! A transition is attributed to the hour of its later sample, and only when
//! both samples were recorded in the same hour of the day. Transitions that
//! straddle an hour boundary are not counted.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use super::{indexed_region, HOURS};
use crate::aggregate::{run_analysis, Analysis, AnalysisRun, PartialAggregate, RunOptions};
use crate::analyzer::{RegionMode, TransitionAnalyzer, TransitionEvent, TransitionSink};
use crate::error::Result;
use crate::region::Rectangle;
use crate::source::WorkUnit;
use crate::Sample;

/// Configuration for flow analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Watched area, or the origin of an exchange
    pub area1: Rectangle,
    /// Destination of an exchange; single-area mode when absent
    #[serde(default)]
    pub area2: Option<Rectangle>,
}

impl FlowConfig {
    pub fn single(area1: Rectangle) -> Self {
        Self { area1, area2: None }
    }

    pub fn pair(area1: Rectangle, area2: Rectangle) -> Self {
        Self {
            area1,
            area2: Some(area2),
        }
    }

    fn region_mode(&self) -> Result<RegionMode> {
        let start = indexed_region(self.area1)?;
        Ok(match self.area2 {
            Some(area2) => RegionMode::Pair {
                start,
                end: indexed_region(area2)?,
            },
            None => RegionMode::Single(start),
        })
    }
}

/// Flow counts of one hour of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowHour {
    pub hour: u32,
    pub flow_in: u64,
    pub flow_out: u64,
    /// `flow_in - flow_out`
    pub net_flow: i64,
}

/// Flow per hour, always 24 entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowResult {
    pub hours: Vec<FlowHour>,
}

impl FlowResult {
    pub fn total_in(&self) -> u64 {
        self.hours.iter().map(|h| h.flow_in).sum()
    }

    pub fn total_out(&self) -> u64 {
        self.hours.iter().map(|h| h.flow_out).sum()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlowPartial {
    flow_in: [u64; HOURS],
    flow_out: [u64; HOURS],
}

impl PartialAggregate for FlowPartial {
    fn merge(&mut self, other: Self) {
        for hour in 0..HOURS {
            self.flow_in[hour] += other.flow_in[hour];
            self.flow_out[hour] += other.flow_out[hour];
        }
    }
}

impl TransitionSink for FlowPartial {
    fn on_event(&mut self, event: TransitionEvent<'_>) {
        match event {
            TransitionEvent::FlowIn { previous_time, current } if previous_time.hour() == current.hour() => {
                self.flow_in[current.hour() as usize] += 1;
            }
            TransitionEvent::FlowOut { previous_time, current } if previous_time.hour() == current.hour() => {
                self.flow_out[current.hour() as usize] += 1;
            }
            _ => {}
        }
    }
}

impl From<FlowPartial> for FlowResult {
    fn from(partial: FlowPartial) -> Self {
        let hours = (0..HOURS)
            .map(|h| FlowHour {
                hour: h as u32,
                flow_in: partial.flow_in[h],
                flow_out: partial.flow_out[h],
                net_flow: partial.flow_in[h] as i64 - partial.flow_out[h] as i64,
            })
            .collect();
        FlowResult { hours }
    }
}

struct FlowAnalysis {
    mode: RegionMode,
}

impl Analysis for FlowAnalysis {
    type Partial = FlowPartial;

    fn name(&self) -> &'static str {
        "flow"
    }

    fn analyze_unit(&self, samples: &[Sample]) -> FlowPartial {
        let mut partial = FlowPartial::default();
        TransitionAnalyzer::new(self.mode.clone()).run(samples, &mut partial);
        partial
    }
}

/// Count hourly flow for the configured area(s) across all units.
pub fn analyze_flow(units: &[WorkUnit], config: &FlowConfig, options: &RunOptions) -> Result<AnalysisRun<FlowResult>> {
    let analysis = FlowAnalysis {
        mode: config.region_mode()?,
    };
    Ok(run_analysis(&analysis, units, options)?.map(FlowResult::from))
}
