//! Completion payloads.

use crate::error::LocationError;
use crate::location::{GeocodedLocation, LocationSample, Placemark};

/// Result of a current-location request.
///
/// `location` may be present alongside an error: on `Timeout` or `Cancelled`
/// it carries the last fix observed, and if reverse geocoding failed
/// it carries the fix that was found.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFix {
    /// Best fix obtained, if any.
    pub location: Option<LocationSample>,
    /// Placemark for the fix, when reverse geocoding was requested and succeeded.
    pub placemark: Option<Placemark>,
    /// True when the fix was served from the cache.
    pub from_cache: bool,
    /// Why the request did not fully succeed.
    pub error: Option<LocationError>,
}

impl LocationFix {
    /// Returns true if the request succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a successful reverse geocode.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressLookup {
    /// Best-matching placemark.
    pub placemark: Placemark,
    /// Formatted single-line address of `placemark`.
    pub address: String,
    /// Locality of `placemark`.
    pub locality: Option<String>,
    /// Other candidate placemarks, best first.
    pub alternates: Vec<Placemark>,
}

impl AddressLookup {
    /// Build from candidates ordered best first. `None` if empty.
    pub fn from_placemarks(mut placemarks: Vec<Placemark>) -> Option<Self> {
        if placemarks.is_empty() {
            return None;
        }
        let placemark = placemarks.remove(0);
        Some(Self {
            address: placemark.formatted_address(),
            locality: placemark.locality.clone(),
            placemark,
            alternates: placemarks,
        })
    }
}

/// Completion payload of any [`LocationRequest`](super::LocationRequest).
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// From a current-location request.
    Location(LocationFix),
    /// From a reverse-geocode request.
    Address(Result<AddressLookup, LocationError>),
    /// From a forward-geocode request.
    Coordinates(Result<GeocodedLocation, LocationError>),
}

impl RequestOutcome {
    /// The error carried by the outcome, if any.
    pub fn error(&self) -> Option<&LocationError> {
        match self {
            Self::Location(fix) => fix.error.as_ref(),
            Self::Address(result) => result.as_ref().err(),
            Self::Coordinates(result) => result.as_ref().err(),
        }
    }
}
