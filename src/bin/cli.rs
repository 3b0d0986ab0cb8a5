//! trajectory-cli - Batch front end for the trajectory engine
//!
//! Usage:
//!   trajectory-cli list <folder> [--keyword <k>] [--limit <n>]
//!   trajectory-cli heatmap <folder> [--cell-size <deg>] [--hour <h>] [--by-hour]
//!   trajectory-cli flow <folder> --area1 <rect> [--area2 <rect>]
//!
//! Rectangles are written `min_lng,max_lng,min_lat,max_lat` and are read in
//! the frame given by `--frame` (GCJ02 unless told otherwise). Results are
//! printed as JSON together with the run summary.

use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use trajectory_engine::{
    analyze_flow, analyze_shortest_paths, generate_heatmap, list_vehicle_ids, mine_frequent_paths,
    retrieve_trajectories, source::units_from_dir, AnalysisRun, CleanConfig, CoordFrame, FlowConfig,
    FrequentPathConfig, HeatmapConfig, Rectangle, RunOptions, ShortestPathConfig, TrajectoryError,
    TrajectoryQuery, TravelTimeMetric, VehicleSelection,
};

#[derive(Parser)]
#[command(name = "trajectory-cli")]
#[command(about = "Spatio-temporal analytics over vehicle trajectory logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Worker threads (default: all cores)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Frame of rectangle arguments
    #[arg(long, global = true, value_enum, default_value = "gcj02")]
    frame: FrameArg,

    /// Write JSON here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FrameArg {
    Wgs84,
    Gcj02,
}

impl From<FrameArg> for CoordFrame {
    fn from(frame: FrameArg) -> Self {
        match frame {
            FrameArg::Wgs84 => CoordFrame::Wgs84,
            FrameArg::Gcj02 => CoordFrame::Gcj02,
        }
    }
}

/// A rectangle as typed on the command line, before a frame is attached.
#[derive(Clone, Copy, Debug)]
struct RectArg([f64; 4]);

impl RectArg {
    fn in_frame(self, frame: CoordFrame) -> Rectangle {
        let [min_lng, max_lng, min_lat, max_lat] = self.0;
        Rectangle::new(min_lng, max_lng, min_lat, max_lat, frame)
    }
}

fn parse_rect(s: &str) -> Result<RectArg, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<_, _>>()?;
    let bounds: [f64; 4] = values
        .try_into()
        .map_err(|_| "expected min_lng,max_lng,min_lat,max_lat".to_string())?;
    Ok(RectArg(bounds))
}

#[derive(Subcommand)]
enum Commands {
    /// List vehicle ids in a data directory
    List {
        /// Folder containing <vehicle_id>.txt logs
        folder: PathBuf,

        /// Only ids containing this text
        #[arg(short, long, default_value = "")]
        keyword: String,

        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Retrieve cleaned trajectories
    Trails {
        folder: PathBuf,

        /// Comma separated vehicle ids (default: all)
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<String>>,

        /// Random subset size
        #[arg(long)]
        sample_count: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Apply Douglas-Peucker simplification
        #[arg(long)]
        simplify: bool,

        #[arg(long, default_value = "0.0001")]
        tolerance: f64,
    },

    /// Point density per grid cell
    Heatmap {
        folder: PathBuf,

        /// Cell size in degrees
        #[arg(long, default_value = "0.01")]
        cell_size: f64,

        /// Only this hour of the day (0-23)
        #[arg(long)]
        hour: Option<u32>,

        #[arg(long, value_parser = parse_rect)]
        bounds: Option<RectArg>,

        /// Also emit one grid per hour
        #[arg(long)]
        by_hour: bool,
    },

    /// Hourly flow into and out of an area, or between two areas
    Flow {
        folder: PathBuf,

        #[arg(long, value_parser = parse_rect)]
        area1: RectArg,

        #[arg(long, value_parser = parse_rect)]
        area2: Option<RectArg>,
    },

    /// Most frequent paths, between two areas or over whole trajectories
    FrequentPaths {
        folder: PathBuf,

        #[arg(long, value_parser = parse_rect, requires = "area_b")]
        area_a: Option<RectArg>,

        #[arg(long, value_parser = parse_rect, requires = "area_a")]
        area_b: Option<RectArg>,

        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        #[arg(long, default_value = "0.001")]
        grid_size: f64,

        /// Minimum path length in meters
        #[arg(long, default_value = "1000")]
        min_distance: f64,
    },

    /// Fastest A to B transit per hour
    ShortestPath {
        folder: PathBuf,

        #[arg(long, value_parser = parse_rect)]
        area_a: RectArg,

        #[arg(long, value_parser = parse_rect)]
        area_b: RectArg,

        /// Measure travel time in samples instead of minutes
        #[arg(long)]
        point_count: bool,
    },
}

#[derive(Serialize)]
struct Report<T: Serialize> {
    summary: trajectory_engine::RunSummary,
    data: T,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn report<T: Serialize>(run: AnalysisRun<T>) -> CliResult<String> {
    for failure in &run.failures {
        warn!("unit {} failed: {}", failure.unit, failure.error);
    }
    Ok(serde_json::to_string_pretty(&Report {
        summary: run.summary,
        data: run.result,
    })?)
}

fn run(cli: Cli) -> CliResult<String> {
    let frame = CoordFrame::from(cli.frame);
    let options = RunOptions {
        workers: cli.workers,
        cancellation: None,
    };

    match cli.command {
        Commands::List { folder, keyword, limit } => {
            Ok(serde_json::to_string_pretty(&list_vehicle_ids(&folder, &keyword, limit)?)?)
        }
        Commands::Trails {
            folder,
            ids,
            sample_count,
            seed,
            simplify,
            tolerance,
        } => {
            let query = TrajectoryQuery {
                vehicles: ids.map_or(VehicleSelection::All, VehicleSelection::Ids),
                sample_count,
                seed,
                clean: CleanConfig { simplify, tolerance },
            };
            report(retrieve_trajectories(&folder, &query, &options)?)
        }
        Commands::Heatmap {
            folder,
            cell_size,
            hour,
            bounds,
            by_hour,
        } => {
            let config = HeatmapConfig {
                cell_size,
                target_hour: hour,
                bounds: bounds.map(|b| b.in_frame(frame)),
                by_hour,
            };
            report(generate_heatmap(&load_units(&folder)?, &config, &options)?)
        }
        Commands::Flow { folder, area1, area2 } => {
            let config = FlowConfig {
                area1: area1.in_frame(frame),
                area2: area2.map(|a| a.in_frame(frame)),
            };
            report(analyze_flow(&load_units(&folder)?, &config, &options)?)
        }
        Commands::FrequentPaths {
            folder,
            area_a,
            area_b,
            top_k,
            grid_size,
            min_distance,
        } => {
            let config = FrequentPathConfig {
                area_a: area_a.map(|a| a.in_frame(frame)),
                area_b: area_b.map(|b| b.in_frame(frame)),
                top_k,
                grid_size,
                min_distance_m: min_distance,
            };
            report(mine_frequent_paths(&load_units(&folder)?, &config, &options)?)
        }
        Commands::ShortestPath {
            folder,
            area_a,
            area_b,
            point_count,
        } => {
            let config = ShortestPathConfig {
                area_a: area_a.in_frame(frame),
                area_b: area_b.in_frame(frame),
                metric: if point_count {
                    TravelTimeMetric::PointCount
                } else {
                    TravelTimeMetric::Minutes
                },
            };
            report(analyze_shortest_paths(&load_units(&folder)?, &config, &options)?)
        }
    }
}

fn load_units(folder: &Path) -> Result<Vec<trajectory_engine::WorkUnit>, TrajectoryError> {
    let units = units_from_dir(folder)?;
    log::info!("Found {} vehicle logs in {}", units.len(), folder.display());
    Ok(units)
}

fn write_output(text: &str, output: Option<&Path>) -> std::io::Result<()> {
    match output {
        Some(path) => fs::write(path, text),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text)
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();
    let output = cli.output.clone();

    match run(cli) {
        Ok(text) => match write_output(&text, output.as_deref()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error writing output: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
