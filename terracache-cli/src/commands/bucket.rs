//! Bucket lookup command.

use clap::Args;
use terracache::bucket::{address_for, neighborhood, BucketAddress};
use terracache::manager::MAX_RETENTION_RADIUS_TILES;

use crate::error::CliError;

/// Arguments for the bucket command.
#[derive(Debug, Args)]
pub struct BucketArgs {
    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Also list the neighbourhood keys within this many rings (at most 8)
    #[arg(long)]
    pub radius: Option<u32>,
}

/// Run the bucket command.
pub fn run(args: BucketArgs) -> Result<(), CliError> {
    let bucket = address_for(args.lon, args.lat)?;
    if let Some(radius) = args.radius {
        if radius > MAX_RETENTION_RADIUS_TILES {
            return Err(CliError::Config(format!(
                "--radius must be at most {}",
                MAX_RETENTION_RADIUS_TILES
            )));
        }
    }
    print!("{}", describe(&bucket));

    if let Some(radius) = args.radius {
        let neighbours = neighborhood(&bucket, radius);
        println!();
        println!("Neighbourhood (radius {}, {} buckets):", radius, neighbours.len());
        for address in neighbours {
            println!("  {}", address.key());
        }
    }

    Ok(())
}

fn describe(bucket: &BucketAddress) -> String {
    let (origin_lon, origin_lat) = bucket.origin();
    let (center_lon, center_lat) = bucket.center();
    format!(
        "Bucket:       {}\n\
         Index:        {}\n\
         Chunk:        {}\n\
         Origin:       {:.4}, {:.4}\n\
         Center:       {:.4}, {:.4}\n\
         Size:         {}° x {}°\n\
         Aspect ratio: {:.3}\n",
        bucket.key(),
        bucket.index(),
        bucket.chunk_name(),
        origin_lon,
        origin_lat,
        center_lon,
        center_lat,
        bucket.width_deg(),
        bucket.height_deg(),
        bucket.aspect_ratio(),
    )
}
