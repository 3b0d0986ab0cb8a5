//! Example of a heatmap over a directory of vehicle logs.
//!
//! Run with: cargo run --example batch_heatmap -- <data_dir> [hour]
//!
//! Without a data directory a small synthetic one is generated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use trajectory_engine::analyses::heatmap::query_heatmap_cell;
use trajectory_engine::source::units_from_dir;
use trajectory_engine::{generate_heatmap, HeatmapConfig, RunOptions};

fn main() {
    println!("Batch Heatmap Example\n");

    let mut args = std::env::args().skip(1);
    let data_dir = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => match write_synthetic_logs(200) {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("cannot create synthetic data: {}", e);
                return;
            }
        },
    };
    let target_hour = args.next().and_then(|h| h.parse().ok());

    let units = match units_from_dir(&data_dir) {
        Ok(units) => units,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    println!("Vehicles: {}", units.len());

    let config = HeatmapConfig {
        cell_size: 0.01,
        target_hour,
        ..HeatmapConfig::default()
    };

    let start = Instant::now();
    let run = match generate_heatmap(&units, &config, &RunOptions::default()) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("heatmap failed: {}", e);
            return;
        }
    };
    let heatmap = run.result;
    println!(
        "{} points in {} cells ({:?}, {} failed units)",
        heatmap.total_points,
        heatmap.cells.len(),
        start.elapsed(),
        run.failures.len()
    );

    let mut busiest: Vec<_> = heatmap.cells.iter().collect();
    busiest.sort_by(|a, b| b.count.cmp(&a.count));
    println!("\nBusiest cells:");
    for cell in busiest.iter().take(5) {
        println!("  ({:.3}, {:.3})  {:6} points  density {:.2}", cell.center_lng, cell.center_lat, cell.count, cell.density);
    }

    if let Some(top) = busiest.first() {
        if let Some(cell) = query_heatmap_cell(&heatmap, top.center_lng, top.center_lat) {
            println!("\nLookup at the busiest center finds {} points", cell.count);
        }
    }
}

/// Random walks through central Beijing, one file per vehicle.
fn write_synthetic_logs(vehicles: usize) -> std::io::Result<PathBuf> {
    let dir = std::env::temp_dir().join("trajectory-engine-demo");
    fs::create_dir_all(&dir)?;
    let mut rng = StdRng::seed_from_u64(2008);

    for id in 0..vehicles {
        let mut file = fs::File::create(dir.join(format!("{}.txt", id)))?;
        let mut lng = rng.gen_range(116.25..116.50);
        let mut lat = rng.gen_range(39.80..40.00);
        for minute in 0..(24 * 60) {
            lng += rng.gen_range(-0.002..0.002);
            lat += rng.gen_range(-0.002..0.002);
            writeln!(file, "{},2008-02-02 {:02}:{:02}:00,{:.5},{:.5}", id, minute / 60, minute % 60, lng, lat)?;
        }
    }
    Ok(dir)
}
