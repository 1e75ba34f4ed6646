//! Locate command - obtain a position fix from the simulated receiver.
//!
//! The receiver reports fixes around the given position with a decreasing
//! accuracy sequence, the way a real receiver converges after a cold start.

use std::time::Duration;

use geofix::provider::ScriptedEvent;
use geofix::{Coordinates, CurrentLocationOptions, GazetteerGeocoder, LocationSample, ManagerConfig, SimulatedProvider};
use tracing::info;

use super::common::{self, AccuracyPreset};
use crate::error::CliError;

/// Metres per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Arguments for the locate command.
pub struct LocateArgs {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: AccuracyPreset,
    pub timeout_secs: Option<u64>,
    pub reverse: bool,
    pub fixes: Vec<f64>,
    pub interval: Duration,
}

/// Build the receiver script: each fix is offset north by half its accuracy.
fn receiver_script(position: Coordinates, fixes: &[f64], interval: Duration) -> Vec<ScriptedEvent> {
    fixes
        .iter()
        .map(|&accuracy| {
            let offset = Coordinates::new(
                position.latitude + accuracy * 0.5 / METERS_PER_DEGREE,
                position.longitude,
            );
            ScriptedEvent::after(interval, Ok(LocationSample::new(offset, accuracy)))
        })
        .collect()
}

/// Run the locate command.
pub async fn run(args: LocateArgs, config: ManagerConfig) -> Result<(), CliError> {
    let position = common::coordinates(args.lat, args.lon)?;
    if args.fixes.iter().any(|a| !a.is_finite() || *a <= 0.0) {
        return Err(CliError::InvalidArgument(
            "--fixes accuracies must be positive".to_string(),
        ));
    }

    let provider = SimulatedProvider::with_script(receiver_script(position, &args.fixes, args.interval));
    let geocoder = GazetteerGeocoder::new(common::builtin_places());

    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(config.default_timeout);
    let manager = common::manager(config, &provider, &geocoder)?;

    let options = CurrentLocationOptions::with_accuracy(args.accuracy.meters())
        .timeout(timeout)
        .reverse(args.reverse);
    info!(accuracy = options.accuracy, timeout_secs = timeout.as_secs(), "Locating");
    println!(
        "Locating to within {:.0} m (timeout {}s)...",
        options.accuracy,
        timeout.as_secs()
    );

    let fix = manager.current_location(options).await;
    manager.shutdown();

    match (&fix.location, &fix.error) {
        (Some(sample), None) => common::print_sample("Fix", sample),
        (Some(sample), Some(_)) => common::print_sample("Best fix", sample),
        (None, _) => println!("No fix received"),
    }
    if let Some(placemark) = &fix.placemark {
        common::print_placemark(placemark);
    }

    match fix.error {
        Some(e) => Err(CliError::Location(e)),
        None => Ok(()),
    }
}
