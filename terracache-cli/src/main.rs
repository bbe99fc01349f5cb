//! terracache CLI - Command-line interface
//!
//! Inspect buckets and tile files, generate synthetic tiles, and drive the
//! tile manager for point queries and simulated flights.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use terracache::config::ConfigFile;
use terracache::logging::{init_logging, LoggingGuard};

use commands::bucket::BucketArgs;
use commands::elevation::ElevationArgs;
use commands::fly::FlyArgs;
use commands::generate::GenerateArgs;
use commands::inspect::InspectArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "terracache")]
#[command(version = terracache::VERSION)]
#[command(about = "Terrain tile addressing, decoding and caching", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.terracache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the bucket containing a position
    Bucket(BucketArgs),

    /// Decode a tile file and print a summary
    Inspect(InspectArgs),

    /// Write synthetic tiles around a position
    Generate(GenerateArgs),

    /// Query elevation and surface normal at a position
    Elevation(ElevationArgs),

    /// Fly a viewer along a straight line and report telemetry
    Fly(FlyArgs),

    /// Write a default config file if none exists and print its path
    Init,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Bucket(args) => commands::bucket::run(args),
        Commands::Inspect(args) => commands::inspect::run(args),
        Commands::Generate(args) => {
            commands::generate::run(args, config.loader.directory.clone()).map(|_| ())
        }
        Commands::Elevation(args) => {
            let _guard = start_logging(&config)?;
            commands::elevation::run(args, &config)
        }
        Commands::Fly(args) => {
            let _guard = start_logging(&config)?;
            commands::fly::run(args, &config).map(|_| ())
        }
        Commands::Init => {
            let path = ConfigFile::ensure_exists()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Logging is only set up for commands that run the tile manager.
fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "terracache",
            "bucket",
            "--lon",
            "-74.006",
            "--lat",
            "40.7128",
        ])
        .unwrap();
        match cli.command {
            Commands::Bucket(args) => {
                assert_eq!(args.lon, -74.006);
                assert!(args.radius.is_none());
            }
            _ => panic!("expected bucket command"),
        }
    }

    #[test]
    fn test_parses_fly_defaults() {
        let cli = Cli::try_parse_from([
            "terracache",
            "fly",
            "--from-lon",
            "8.5",
            "--from-lat",
            "47.3",
            "--to-lon",
            "9.0",
            "--to-lat",
            "47.5",
            "--synthetic",
        ])
        .unwrap();
        match cli.command {
            Commands::Fly(args) => {
                assert_eq!(args.steps, 200);
                assert!(args.synthetic);
                assert!(args.interval_ms.is_none());
            }
            _ => panic!("expected fly command"),
        }
    }
}
