//! Reverse and forward geocoding commands.

use geofix::{accuracy, Coordinates, GazetteerGeocoder, LocationSample, ManagerConfig, SimulatedProvider};

use super::common;
use crate::error::CliError;

/// Arguments for the reverse command.
pub struct ReverseArgs {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
}

/// Arguments for the forward command.
pub struct ForwardArgs {
    pub address: String,
}

/// Run the reverse command.
pub async fn reverse(args: ReverseArgs, config: ManagerConfig) -> Result<(), CliError> {
    // Validated by the request itself; out-of-range input is an InvalidInput error.
    let sample = LocationSample::new(Coordinates::new(args.lat, args.lon), accuracy::BEST);
    let geocoder = GazetteerGeocoder::new(common::builtin_places()).with_reverse_radius(args.radius_m);
    let manager = common::manager(config, &SimulatedProvider::new(), &geocoder)?;

    let result = manager.reverse_geocode(sample).await;
    manager.shutdown();
    let lookup = result?;

    println!("{}", lookup.address);
    common::print_placemark(&lookup.placemark);
    if let Some(locality) = &lookup.locality {
        println!("  Locality: {}", locality);
    }
    if !lookup.alternates.is_empty() {
        println!("Also nearby:");
        for placemark in &lookup.alternates {
            println!(
                "  - {}",
                placemark
                    .name
                    .clone()
                    .unwrap_or_else(|| placemark.formatted_address())
            );
        }
    }
    Ok(())
}

/// Run the forward command.
pub async fn forward(args: ForwardArgs, config: ManagerConfig) -> Result<(), CliError> {
    let geocoder = GazetteerGeocoder::new(common::builtin_places());
    let manager = common::manager(config, &SimulatedProvider::new(), &geocoder)?;

    let result = manager.forward_geocode(args.address).await;
    manager.shutdown();
    let location = result?;

    println!("{}", location.coordinates);
    if let Some(radius) = location.radius {
        println!("  Radius:   {:.0} m", radius);
    }
    if let Some(placemark) = &location.placemark {
        common::print_placemark(placemark);
    }
    Ok(())
}
