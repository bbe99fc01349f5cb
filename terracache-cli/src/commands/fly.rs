//! Simulated flight along a straight line.
//!
//! Moves a viewer from one position to another, stepping the tile manager
//! once per position and querying the terrain underneath, then prints the
//! telemetry for the run.

use std::time::Duration;

use clap::Args;
use terracache::config::ConfigFile;
use terracache::manager::TileManager;
use terracache::telemetry::TelemetrySnapshot;
use tracing::info;

use super::common::{build_loader, build_runtime};
use crate::error::CliError;

/// Arguments for the fly command.
#[derive(Debug, Args)]
pub struct FlyArgs {
    /// Start longitude
    #[arg(long, allow_hyphen_values = true)]
    pub from_lon: f64,

    /// Start latitude
    #[arg(long, allow_hyphen_values = true)]
    pub from_lat: f64,

    /// End longitude
    #[arg(long, allow_hyphen_values = true)]
    pub to_lon: f64,

    /// End latitude
    #[arg(long, allow_hyphen_values = true)]
    pub to_lat: f64,

    /// Number of steps along the route
    #[arg(long, default_value = "200")]
    pub steps: u32,

    /// Wall-clock time per step; without it every step waits for its loads
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Use generated terrain instead of the configured loader
    #[arg(long)]
    pub synthetic: bool,

    /// Print the telemetry summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome of a flight.
#[derive(Debug)]
pub struct FlightSummary {
    pub answered: u32,
    pub unavailable: u32,
    pub telemetry: TelemetrySnapshot,
}

/// Run the fly command.
pub fn run(args: FlyArgs, config: &ConfigFile) -> Result<FlightSummary, CliError> {
    if args.steps == 0 {
        return Err(CliError::Config("--steps must be at least 1".to_string()));
    }

    let loader = build_loader(config, args.synthetic)?;
    let runtime = build_runtime()?;
    let mut manager =
        TileManager::with_runtime(config.manager_config(), loader, runtime.handle().clone());

    let mut answered = 0;
    let mut unavailable = 0;

    for i in 0..=args.steps {
        let t = i as f64 / args.steps as f64;
        let lon = args.from_lon + (args.to_lon - args.from_lon) * t;
        let lat = args.from_lat + (args.to_lat - args.from_lat) * t;

        manager.set_viewer_position(lon, lat)?;
        let report = manager.step_once();

        match args.interval_ms {
            Some(ms) => runtime.block_on(tokio::time::sleep(Duration::from_millis(ms))),
            None => {
                runtime.block_on(manager.settle());
            }
        }

        match manager.elevation_at(lon, lat) {
            Ok(_) => answered += 1,
            Err(_) => unavailable += 1,
        }

        if report.issued > 0 || report.evicted > 0 {
            info!(%report, "Step");
        }
    }

    runtime.block_on(manager.settle());
    let telemetry = manager.metrics().snapshot();
    let stats = manager.cache().stats();
    manager.shutdown();

    if args.json {
        let value = serde_json::to_string_pretty(&telemetry)
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        println!("{}", value);
    } else {
        println!(
            "Flew {} steps: {} answered, {} unavailable",
            args.steps + 1,
            answered,
            unavailable
        );
        println!();
        println!("{}", telemetry);
        println!("Cache:            {}", stats);
    }

    Ok(FlightSummary {
        answered,
        unavailable,
        telemetry,
    })
}
