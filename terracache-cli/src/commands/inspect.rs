//! Tile file inspection command.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use terracache::codec;
use terracache::grid::{ElevationGrid, Plane};

use crate::error::CliError;

/// Samples used for the summary plane fit.
const PLANE_FIT_SAMPLES: usize = 4096;

/// Arguments for the inspect command.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Tile file (.egrd or gzip-compressed .egrd.gz)
    pub file: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the inspect command.
pub fn run(args: InspectArgs) -> Result<(), CliError> {
    let data = std::fs::read(&args.file).map_err(|error| CliError::FileRead {
        path: args.file.clone(),
        error,
    })?;

    let grid = codec::decode(&data).map_err(|error| CliError::Decode {
        path: args.file.clone(),
        error,
    })?;
    let plane = grid.fit_plane(PLANE_FIT_SAMPLES).ok();

    if args.json {
        println!("{}", summary_json(&grid, plane.as_ref(), codec::is_gzip(&data)));
    } else {
        print!("{}", summary_text(&grid, plane.as_ref(), data.len()));
    }
    Ok(())
}

fn summary_text(grid: &ElevationGrid, plane: Option<&Plane>, file_len: usize) -> String {
    let (origin_lon, origin_lat) = grid.origin_deg();
    let mut out = String::new();
    out.push_str(&format!("Resolution:  {}\n", grid.resolution()));
    out.push_str(&format!(
        "Dimensions:  {} x {} ({} samples)\n",
        grid.columns(),
        grid.rows(),
        grid.samples().len()
    ));
    out.push_str(&format!("Origin:      {:.5}, {:.5}\n", origin_lon, origin_lat));
    match (grid.min_elevation(), grid.max_elevation()) {
        (Some(min), Some(max)) => out.push_str(&format!("Elevation:   {} .. {} m\n", min, max)),
        _ => out.push_str("Elevation:   no data\n"),
    }
    out.push_str(&format!("No-data:     {}\n", grid.no_data_count()));
    out.push_str(&format!("File size:   {} bytes\n", file_len));
    match plane {
        Some(plane) => out.push_str(&format!(
            "Plane:       slope {:.2}°, rms {:.1} m ({} samples, stride {})\n",
            plane.slope_deg(),
            plane.rms_residual,
            plane.sample_count,
            plane.stride
        )),
        None => out.push_str("Plane:       unavailable\n"),
    }
    out
}

fn summary_json(grid: &ElevationGrid, plane: Option<&Plane>, gzip: bool) -> serde_json::Value {
    let (origin_lon, origin_lat) = grid.origin_deg();
    json!({
        "resolution": grid.resolution().to_string(),
        "spacing_arcsec": grid.spacing_arcsec(),
        "columns": grid.columns(),
        "rows": grid.rows(),
        "origin": { "lon": origin_lon, "lat": origin_lat },
        "min_elevation": grid.min_elevation(),
        "max_elevation": grid.max_elevation(),
        "no_data": grid.no_data_count(),
        "gzip": gzip,
        "plane": plane.map(|plane| json!({
            "normal": [plane.normal.x, plane.normal.y, plane.normal.z],
            "offset": plane.offset,
            "slope_deg": plane.slope_deg(),
            "rms_residual": plane.rms_residual,
            "samples": plane.sample_count,
        })),
    })
}
