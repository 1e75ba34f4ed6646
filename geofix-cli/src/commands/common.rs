//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use geofix::{
    accuracy, Coordinates, GazetteerGeocoder, LocationManager, LocationSample, ManagerConfig,
    Placemark, SimulatedProvider,
};

use crate::error::CliError;

/// Accuracy preset selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum AccuracyPreset {
    /// Best the receiver can do (5 m)
    Best,
    /// Within ten metres
    TenMeters,
    /// Within a hundred metres
    HundredMeters,
    /// Within one kilometre
    Kilometer,
    /// Within three kilometres
    ThreeKilometers,
}

impl AccuracyPreset {
    pub fn meters(self) -> f64 {
        match self {
            AccuracyPreset::Best => accuracy::BEST,
            AccuracyPreset::TenMeters => accuracy::NEAREST_TEN_METERS,
            AccuracyPreset::HundredMeters => accuracy::HUNDRED_METERS,
            AccuracyPreset::Kilometer => accuracy::KILOMETER,
            AccuracyPreset::ThreeKilometers => accuracy::THREE_KILOMETERS,
        }
    }
}

/// Load configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ManagerConfig, CliError> {
    let config = match path {
        Some(path) => ManagerConfig::load_from(path)?,
        None => ManagerConfig::load()?,
    };
    Ok(config)
}

/// Validate a coordinate pair from the command line.
pub fn coordinates(lat: f64, lon: f64) -> Result<Coordinates, CliError> {
    let coordinates = Coordinates::new(lat, lon);
    if !coordinates.is_valid() {
        return Err(CliError::InvalidArgument(format!(
            "{} is not a valid coordinate",
            coordinates
        )));
    }
    Ok(coordinates)
}

/// Create a manager over the given simulated provider and geocoder.
pub fn manager(
    config: ManagerConfig,
    provider: &SimulatedProvider,
    geocoder: &GazetteerGeocoder,
) -> Result<LocationManager, CliError> {
    let manager = LocationManager::new(
        config,
        Arc::new(provider.clone()),
        Arc::new(geocoder.clone()),
    )?;
    Ok(manager)
}

#[allow(clippy::too_many_arguments)]
fn place(
    name: &str,
    thoroughfare: &str,
    postal_code: &str,
    locality: &str,
    country: &str,
    iso: &str,
    lat: f64,
    lon: f64,
) -> Placemark {
    Placemark {
        name: Some(name.to_string()),
        thoroughfare: Some(thoroughfare.to_string()),
        locality: Some(locality.to_string()),
        administrative_area: None,
        postal_code: Some(postal_code.to_string()),
        country: Some(country.to_string()),
        iso_country_code: Some(iso.to_string()),
        coordinates: Some(Coordinates::new(lat, lon)),
    }
}

/// The built-in gazetteer.
pub fn builtin_places() -> Vec<Placemark> {
    vec![
        place("Rathaus", "Rathausmarkt 1", "20095", "Hamburg", "Germany", "DE", 53.5503, 9.9921),
        place("Elbphilharmonie", "Platz der Deutschen Einheit 4", "20457", "Hamburg", "Germany", "DE", 53.5413, 9.9841),
        place("Brandenburger Tor", "Pariser Platz", "10117", "Berlin", "Germany", "DE", 52.5163, 13.3777),
        place("Tour Eiffel", "Champ de Mars, 5 Avenue Anatole France", "75007", "Paris", "France", "FR", 48.8584, 2.2945),
        place("Big Ben", "Westminster", "SW1A 0AA", "London", "United Kingdom", "GB", 51.5007, -0.1246),
        place("Empire State Building", "20 W 34th St", "10001", "New York", "United States", "US", 40.7484, -73.9857),
    ]
}

/// Print a fix on one line.
pub fn print_sample(label: &str, sample: &LocationSample) {
    println!(
        "{:<10} {}  ±{:.0} m  ({} ms old)",
        label,
        sample.coordinates,
        sample.accuracy,
        sample.age().as_millis()
    );
}

/// Print a placemark.
pub fn print_placemark(placemark: &Placemark) {
    if let Some(name) = &placemark.name {
        println!("  Name:     {}", name);
    }
    println!("  Address:  {}", placemark.formatted_address());
    if let Some(code) = &placemark.iso_country_code {
        println!("  Country:  {}", code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_accuracy_presets() {
        assert_eq!(AccuracyPreset::Best.meters(), 5.0);
        assert_eq!(AccuracyPreset::HundredMeters.meters(), 100.0);
        assert_eq!(AccuracyPreset::ThreeKilometers.meters(), 3_000.0);
    }

    #[test]
    fn test_coordinates_validation() {
        assert!(coordinates(53.5, 9.9).is_ok());
        assert!(matches!(
            coordinates(95.0, 0.0),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_load_config_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[location]\nrequest_timeout_secs = 3").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.default_timeout.as_secs(), 3);
    }

    #[test]
    fn test_builtin_places_are_valid() {
        for place in builtin_places() {
            assert!(place.coordinates.unwrap().is_valid());
        }
    }
}
