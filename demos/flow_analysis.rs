//! Example of hourly flow and shortest transit between two areas.
//!
//! Run with: cargo run --example flow_analysis

use chrono::{Duration, NaiveDate};
use trajectory_engine::{
    analyze_flow, analyze_shortest_paths, CoordFrame, FlowConfig, Rectangle, RunOptions, Sample,
    ShortestPathConfig, WorkUnit,
};

fn main() {
    println!("Region Flow Example\n");

    // Two neighbouring areas around Tiananmen, declared in raw GPS coordinates
    let west = Rectangle::new(116.380, 116.395, 39.900, 39.915, CoordFrame::Wgs84);
    let east = Rectangle::new(116.400, 116.415, 39.900, 39.915, CoordFrame::Wgs84);

    // Ten taxis drive west -> east during the morning, each a little slower
    let Some(day) = NaiveDate::from_ymd_opt(2008, 2, 2).and_then(|d| d.and_hms_opt(8, 0, 0)) else {
        return;
    };
    let units: Vec<WorkUnit> = (0..10)
        .map(|i| {
            let id = format!("taxi-{}", i);
            let start = day + Duration::minutes(5 * i);
            let samples = (0..6)
                .map(|step| {
                    let t = start + Duration::minutes(step * (2 + i % 3));
                    Sample::new(&id, t, 116.385 + step as f64 * 0.005, 39.907)
                })
                .collect();
            WorkUnit::Samples { label: id, samples }
        })
        .collect();

    let options = RunOptions::default();

    match analyze_flow(&units, &FlowConfig::pair(west, east), &options) {
        Ok(run) => {
            println!("West -> East exchange ({} units in {}ms):", run.summary.units_processed, run.summary.elapsed_ms);
            for hour in run.result.hours.iter().filter(|h| h.flow_in + h.flow_out > 0) {
                println!("  {:02}:00  in={:3}  out={:3}  net={:4}", hour.hour, hour.flow_in, hour.flow_out, hour.net_flow);
            }
        }
        Err(e) => eprintln!("flow analysis failed: {}", e),
    }

    match analyze_shortest_paths(&units, &ShortestPathConfig::new(west, east), &options) {
        Ok(run) => {
            println!("\nFastest transit per hour:");
            for hour in &run.result.hours {
                if let Some(minutes) = hour.travel_time {
                    println!("  {:02}:00  {:5.1} min  ({} vehicles)", hour.hour, minutes, hour.sample_count);
                }
            }
        }
        Err(e) => eprintln!("shortest path analysis failed: {}", e),
    }
}
