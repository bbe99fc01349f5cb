//! Single-point terrain query command.

use clap::Args;
use terracache::config::ConfigFile;
use terracache::manager::TileManager;

use super::common::{build_loader, build_runtime};
use crate::error::CliError;

/// Samples used for the coarse plane of the containing bucket.
const PLANE_SAMPLES: usize = 1024;

/// Arguments for the elevation command.
#[derive(Debug, Args)]
pub struct ElevationArgs {
    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Sampling radius for the surface normal, in metres
    #[arg(long, default_value = "50")]
    pub radius_m: f64,

    /// Use generated terrain instead of the configured loader
    #[arg(long)]
    pub synthetic: bool,
}

/// Run the elevation command.
pub fn run(args: ElevationArgs, config: &ConfigFile) -> Result<(), CliError> {
    let loader = build_loader(config, args.synthetic)?;
    let runtime = build_runtime()?;
    let mut manager =
        TileManager::with_runtime(config.manager_config(), loader, runtime.handle().clone());

    let bucket = manager.set_viewer_position(args.lon, args.lat)?;
    let report = manager.step_once();
    runtime.block_on(manager.settle());

    println!("Bucket:    {}", bucket.key());
    println!(
        "Loaded:    {} of {} tiles ({} failed)",
        manager.cache().ready_count(),
        report.required,
        manager.cache().failed_count()
    );

    let result = query(&manager, &args);
    manager.shutdown();
    result
}

fn query(manager: &TileManager, args: &ElevationArgs) -> Result<(), CliError> {
    let elevation = manager.elevation_at(args.lon, args.lat)?;
    let normal = manager.normal_near(args.lon, args.lat, args.radius_m)?;

    println!("Elevation: {:.1} m", elevation);
    println!(
        "Normal:    {} (slope {:.2}° over {} m)",
        normal,
        normal.slope_deg(),
        args.radius_m
    );
    match manager.plane_near(args.lon, args.lat, PLANE_SAMPLES) {
        Ok(plane) => println!(
            "Plane:     slope {:.2}°, rms {:.1} m",
            plane.slope_deg(),
            plane.rms_residual
        ),
        Err(e) => println!("Plane:     unavailable ({})", e),
    }
    Ok(())
}
