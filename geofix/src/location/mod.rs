//! Location data model.
//!
//! Position samples as delivered by a Location Provider, plus the placemark
//! and geocoded-location shapes returned by a Geocoding Service.

mod placemark;
mod sample;

pub use placemark::{GeocodedLocation, Placemark};
pub use sample::{accuracy, Coordinates, LocationSample};
