//! Synthetic tile generation command.
//!
//! Writes one file per bucket in the neighbourhood of a position, laid out
//! the way the directory loader expects: `<dir>/<chunk>/<index>.egrd`.

use std::path::PathBuf;

use clap::Args;
use terracache::bucket::{address_for, neighborhood};
use terracache::codec;
use terracache::loader::{FileSystemLoader, SyntheticLoader};

use super::common::Resolution;
use crate::error::CliError;

/// Arguments for the generate command.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Output directory (defaults to the configured tile directory)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Rings of buckets around the centre
    #[arg(long, default_value = "1")]
    pub radius: u32,

    /// Grid spacing
    #[arg(long, value_enum, default_value = "thirty")]
    pub resolution: Resolution,

    /// Write gzip-compressed .egrd.gz files
    #[arg(long)]
    pub gzip: bool,
}

/// Run the generate command. Returns the number of tiles written.
pub fn run(args: GenerateArgs, default_dir: PathBuf) -> Result<usize, CliError> {
    let root = args.dir.unwrap_or(default_dir);
    let files = FileSystemLoader::new(root);
    let synthetic = SyntheticLoader::new(args.resolution.into());

    let center = address_for(args.lon, args.lat)?;
    let addresses = neighborhood(&center, args.radius);

    for address in &addresses {
        let key = address.key();
        let grid = synthetic.grid_for(address);
        let (path, payload) = if args.gzip {
            let payload = codec::encode_gzip(&grid).map_err(|error| CliError::Encode {
                path: files.gz_path_for(&key),
                error,
            })?;
            (files.gz_path_for(&key), payload)
        } else {
            (files.path_for(&key), codec::encode(&grid))
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| CliError::FileWrite {
                path: parent.to_path_buf(),
                error,
            })?;
        }
        std::fs::write(&path, &payload).map_err(|error| CliError::FileWrite {
            path: path.clone(),
            error,
        })?;
        println!("  {} ({} bytes)", path.display(), payload.len());
    }

    println!(
        "Wrote {} tiles to {}",
        addresses.len(),
        files.root().display()
    );
    Ok(addresses.len())
}
