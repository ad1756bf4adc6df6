//! Mission Tracker CLI
//!
//! Inspect radiation hazards, run the coordination engines against
//! in-memory backends, and manage the configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use missiontracker::config::ConfigFile;
use missiontracker::logging;

use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "missiontracker")]
#[command(version, about = "Position publishing, offline regions and radiation hazards for missions", long_about = None)]
struct Cli {
    /// Log filter, overriding the config file (e.g. debug)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the radiation warning at a position
    Hazard {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// JSON file holding an array of radiation documents
        #[arg(long)]
        areas: PathBuf,

        /// Print the area polygons as a GeoJSON FeatureCollection
        #[arg(long)]
        geojson: bool,
    },

    /// Run the publisher, reconciler and hazard monitor on a scripted walk
    Simulate {
        /// How long to run
        #[arg(long, default_value = "20")]
        seconds: u64,

        /// Fraction of remote writes that fail (0.0 - 1.0)
        #[arg(long, default_value = "0.0")]
        fail_rate: f64,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match ConfigFile::load() {
        Ok(config) => config,
        Err(e) => CliError::from(e).exit(),
    };

    let mut log_config = config.logging.clone();
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    let _log_guard = logging::init(&log_config);

    let result = match cli.command {
        Commands::Hazard {
            lat,
            lon,
            areas,
            geojson,
        } => commands::hazard::run(commands::hazard::HazardArgs {
            latitude: lat,
            longitude: lon,
            areas,
            geojson,
        }),
        Commands::Simulate { seconds, fail_rate } => {
            commands::simulate::run(&config, commands::simulate::SimulateArgs { seconds, fail_rate })
        }
        Commands::Config { command } => commands::config::run(command, &config),
    };

    if let Err(e) = result {
        e.exit();
    }
}
