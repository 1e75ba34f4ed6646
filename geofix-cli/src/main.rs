//! Geofix CLI - Command-line interface
//!
//! Drives the geofix library against a simulated receiver and the built-in
//! gazetteer.

mod commands;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use geofix::logging::{default_log_dir, default_log_file, init_logging};
use tracing::info;

use commands::common::{self, AccuracyPreset};
use error::CliError;

#[derive(Parser)]
#[command(name = "geofix")]
#[command(version = geofix::VERSION)]
#[command(about = "Position fixes, geocoding and significant-change monitoring", long_about = None)]
struct Cli {
    /// Config file (default: ~/.geofix/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log directory (default: ~/.geofix/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain a position fix from the simulated receiver
    Locate {
        /// Latitude of the simulated receiver
        #[arg(long, default_value_t = 53.5503, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude of the simulated receiver
        #[arg(long, default_value_t = 9.9921, allow_hyphen_values = true)]
        lon: f64,

        /// Required accuracy
        #[arg(long, value_enum, default_value = "hundred-meters")]
        accuracy: AccuracyPreset,

        /// Seconds to wait for the required accuracy (default from config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Also resolve the fix to an address
        #[arg(long)]
        reverse: bool,

        /// Accuracies (metres) the receiver reports, in order
        #[arg(long, value_delimiter = ',', default_value = "1500,400,90,25,8")]
        fixes: Vec<f64>,

        /// Milliseconds between receiver fixes
        #[arg(long, default_value_t = 400)]
        interval_ms: u64,
    },

    /// Resolve coordinates to an address
    Reverse {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Search radius in metres
        #[arg(long, default_value_t = 5_000.0)]
        radius: f64,
    },

    /// Resolve an address to coordinates
    Forward {
        /// Address or place name
        #[arg(required = true, num_args = 1..)]
        address: Vec<String>,
    },

    /// Monitor significant changes along a simulated route
    Watch {
        /// Start of the route as LAT,LON
        #[arg(long, value_delimiter = ',', num_args = 2, default_values_t = [53.5503, 9.9921], allow_hyphen_values = true)]
        from: Vec<f64>,

        /// End of the route as LAT,LON
        #[arg(long, value_delimiter = ',', num_args = 2, default_values_t = [52.5163, 13.3777], allow_hyphen_values = true)]
        to: Vec<f64>,

        /// Number of legs along the route
        #[arg(long, default_value_t = 5)]
        steps: usize,

        /// Milliseconds between reported changes
        #[arg(long, default_value_t = 1_000)]
        interval_ms: u64,

        /// Stop after this many events (default: whole route)
        #[arg(long)]
        count: Option<usize>,

        /// Resolve every change to an address
        #[arg(long)]
        reverse: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let log_dir = cli.log_dir.unwrap_or_else(default_log_dir);
    let _logging_guard = init_logging(&log_dir, default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    info!("Geofix v{}", geofix::VERSION);

    let config = common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Locate {
            lat,
            lon,
            accuracy,
            timeout,
            reverse,
            fixes,
            interval_ms,
        } => {
            commands::locate::run(
                commands::locate::LocateArgs {
                    lat,
                    lon,
                    accuracy,
                    timeout_secs: timeout,
                    reverse,
                    fixes,
                    interval: Duration::from_millis(interval_ms),
                },
                config,
            )
            .await
        }
        Commands::Reverse { lat, lon, radius } => {
            commands::geocode::reverse(
                commands::geocode::ReverseArgs {
                    lat,
                    lon,
                    radius_m: radius,
                },
                config,
            )
            .await
        }
        Commands::Forward { address } => {
            commands::geocode::forward(
                commands::geocode::ForwardArgs {
                    address: address.join(" "),
                },
                config,
            )
            .await
        }
        Commands::Watch {
            from,
            to,
            steps,
            interval_ms,
            count,
            reverse,
        } => {
            commands::watch::run(
                commands::watch::WatchArgs {
                    from: pair(&from)?,
                    to: pair(&to)?,
                    steps,
                    interval: Duration::from_millis(interval_ms),
                    count,
                    reverse,
                },
                config,
            )
            .await
        }
    }
}

fn pair(values: &[f64]) -> Result<(f64, f64), CliError> {
    match values {
        [lat, lon] => Ok((*lat, *lon)),
        _ => Err(CliError::InvalidArgument(
            "expected LAT,LON".to_string(),
        )),
    }
}
