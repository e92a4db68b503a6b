#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the collapsing road headless and reports its state.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::PathBuf,
    time::Duration,
};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use collapse_road_core::{BoundingBox, CellState, ObstacleChecker, RoadDimensions, SimulationInput};
use collapse_road_runtime::{CollapsingRoad, RoadConfig};
use log::info;
use serde::Serialize;

/// Runs the collapsing road for a number of ticks and reports what is left of it.
#[derive(Debug, Parser)]
#[command(name = "collapse-road", version, about)]
struct Cli {
    /// TOML file with the seed and tuning tables.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the seed from the config file.
    #[arg(long)]
    seed: Option<u64>,
    /// Number of frames to simulate.
    #[arg(long, default_value_t = 500)]
    ticks: u32,
    /// Frame duration in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,
    /// Travel speed in world units per second; zero pauses the road.
    #[arg(long, default_value_t = 55.0)]
    scroll_speed: f64,
    /// Match length in seconds; difficulty ramps to its maximum over it.
    #[arg(long, default_value_t = 180.0)]
    match_seconds: f64,
    /// Segment length to rebuild the road to before running.
    #[arg(long)]
    target_length: Option<f64>,
    /// Lane whose cells an obstacle occupies along the whole road. Repeatable.
    #[arg(long = "obstacle-lane")]
    obstacle_lanes: Vec<u32>,
    /// Prints the report as JSON.
    #[arg(long)]
    json: bool,
}

/// Obstacle layer that fills whole lanes.
#[derive(Debug)]
struct LaneObstacles {
    dimensions: RoadDimensions,
    lanes: Vec<u32>,
}

impl ObstacleChecker for LaneObstacles {
    fn blocks_collapse_at(&self, x: f64, _z: f64, _radius: f64) -> bool {
        let offset = (x + self.dimensions.total_width() / 2.0) / self.dimensions.cell_size();
        if !offset.is_finite() || offset < 0.0 {
            return false;
        }
        let lane = offset.floor() as u32;
        self.lanes.contains(&lane)
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    seed: u64,
    ticks: u64,
    columns: u32,
    rows_per_segment: u32,
    segment_count: u32,
    active: usize,
    falling: usize,
    fallen: usize,
    gaps: usize,
    safe_path_intact: bool,
    fingerprint: String,
    gap_boxes: Vec<BoundingBox>,
}

/// Entry point for the collapsing-road command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RoadConfig::load(path)
            .with_context(|| format!("failed to load road config from {}", path.display()))?,
        None => RoadConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    ensure!(
        cli.dt.is_finite() && cli.dt > 0.0,
        "--dt must be a positive number of seconds, got {}",
        cli.dt
    );
    let dt = Duration::try_from_secs_f64(cli.dt).context("--dt is out of range")?;

    let mut road = CollapsingRoad::from_config(&config).context("road config rejected")?;
    if let Some(target_length) = cli.target_length {
        road.rebuild(target_length);
    }
    if !cli.obstacle_lanes.is_empty() {
        road.set_obstacle_checker(LaneObstacles {
            dimensions: road.dimensions(),
            lanes: cli.obstacle_lanes.clone(),
        });
    }

    let mut safe_path_intact = true;
    for tick in 0..cli.ticks {
        let elapsed = f64::from(tick) * cli.dt;
        let progress = if cli.match_seconds > 0.0 {
            (elapsed / cli.match_seconds).min(1.0)
        } else {
            1.0
        };
        road.update(SimulationInput::new(dt, cli.scroll_speed).with_match_progress(progress));
        safe_path_intact &= road
            .cells()
            .iter()
            .filter(|cell| cell.is_safe_path)
            .all(|cell| cell.state == CellState::Active);
    }

    let report = build_report(&road, config.seed, safe_path_intact);
    info!(
        "ran {} ticks: {} gaps, fingerprint {}",
        report.ticks, report.gaps, report.fingerprint
    );

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }
    Ok(())
}

fn build_report(road: &CollapsingRoad, seed: u64, safe_path_intact: bool) -> RunReport {
    let dimensions = road.dimensions();
    let stats = road.stats();
    RunReport {
        seed,
        ticks: road.tick_index(),
        columns: dimensions.columns(),
        rows_per_segment: dimensions.rows_per_segment(),
        segment_count: dimensions.segment_count(),
        active: stats.active,
        falling: stats.falling,
        fallen: stats.fallen,
        gaps: stats.gaps,
        safe_path_intact,
        fingerprint: format!("{:016x}", fingerprint(road)),
        gap_boxes: road.gap_bounding_boxes(),
    }
}

fn fingerprint(road: &CollapsingRoad) -> u64 {
    let mut hasher = DefaultHasher::new();
    for cell in road.cells().iter() {
        cell.coord.hash(&mut hasher);
        cell.state.hash(&mut hasher);
    }
    hasher.finish()
}

fn print_report(report: &RunReport) {
    println!(
        "road {}x{}x{} after {} ticks (seed {})",
        report.columns, report.rows_per_segment, report.segment_count, report.ticks, report.seed
    );
    println!(
        "cells: {} active, {} falling, {} fallen",
        report.active, report.falling, report.fallen
    );
    println!("gaps: {}", report.gaps);
    println!(
        "safe path: {}",
        if report.safe_path_intact {
            "intact"
        } else {
            "BROKEN"
        }
    );
    println!("fingerprint: {}", report.fingerprint);
}
