//! Coordinates and timestamped position samples.
//!
//! # Accuracy
//!
//! Accuracy is a radius in metres: smaller is better. A sample "satisfies"
//! a requested accuracy when its value is numerically less than or equal to
//! the requested value.
//!
//! Timestamps use [`tokio::time::Instant`] so ages follow the runtime clock,
//! which tests can pause and advance.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Accuracy presets in metres.
pub mod accuracy {
    /// Highest precision the provider can deliver.
    pub const BEST: f64 = 5.0;
    /// Within ten metres.
    pub const NEAREST_TEN_METERS: f64 = 10.0;
    /// Within a hundred metres.
    pub const HUNDRED_METERS: f64 = 100.0;
    /// Within one kilometre.
    pub const KILOMETER: f64 = 1_000.0;
    /// Within three kilometres.
    pub const THREE_KILOMETERS: f64 = 3_000.0;
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true if both components are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance to `other`, in metres.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A single position fix. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Where the fix was taken.
    pub coordinates: Coordinates,
    /// Horizontal accuracy radius in metres (smaller = better).
    pub accuracy: f64,
    /// When the fix was captured.
    pub timestamp: Instant,
}

impl LocationSample {
    /// Create a sample captured now.
    pub fn new(coordinates: Coordinates, accuracy: f64) -> Self {
        Self::with_timestamp(coordinates, accuracy, Instant::now())
    }

    /// Create a sample with an explicit capture time.
    pub fn with_timestamp(coordinates: Coordinates, accuracy: f64, timestamp: Instant) -> Self {
        Self {
            coordinates,
            accuracy,
            timestamp,
        }
    }

    /// Elapsed time since capture.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.timestamp)
    }

    /// Returns true if this fix is at least as precise as `accuracy`.
    pub fn satisfies(&self, accuracy: f64) -> bool {
        self.accuracy <= accuracy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(53.55, 9.99).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0);
        let d = a.distance_to(&b);
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        let hamburg = Coordinates::new(53.5511, 9.9937);
        let london = Coordinates::new(51.5072, -0.1276);
        assert!((hamburg.distance_to(&london) - london.distance_to(&hamburg)).abs() < 1e-6);
        assert_eq!(hamburg.distance_to(&hamburg), 0.0);
    }

    #[test]
    fn test_satisfies_accuracy() {
        let sample = LocationSample::new(Coordinates::new(53.0, 10.0), 50.0);
        assert!(sample.satisfies(accuracy::HUNDRED_METERS));
        assert!(sample.satisfies(50.0));
        assert!(!sample.satisfies(accuracy::NEAREST_TEN_METERS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_age_follows_runtime_clock() {
        let sample = LocationSample::new(Coordinates::new(53.0, 10.0), 10.0);
        assert_eq!(sample.age(), Duration::ZERO);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(sample.age(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_timestamp_has_zero_age() {
        let later = Instant::now() + Duration::from_secs(5);
        let sample = LocationSample::with_timestamp(Coordinates::new(0.0, 0.0), 10.0, later);
        assert_eq!(sample.age(), Duration::ZERO);
    }
}
