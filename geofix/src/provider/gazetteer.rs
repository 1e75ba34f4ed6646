//! In-memory Geocoding Service backed by a table of known places.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::traits::GeocodingService;
use crate::error::GeocodeError;
use crate::location::{Coordinates, GeocodedLocation, Placemark};

/// Default search radius for reverse lookups (5 km).
pub const DEFAULT_REVERSE_RADIUS_M: f64 = 5_000.0;

/// Geocoder answering from a fixed list of placemarks.
///
/// - Forward lookups match the address text case-insensitively against each
///   placemark's name, thoroughfare, locality and formatted address.
/// - Reverse lookups return every placemark within the search radius,
///   nearest first.
#[derive(Clone)]
pub struct GazetteerGeocoder {
    places: Arc<Vec<Placemark>>,
    reverse_radius_m: f64,
    latency: Option<Duration>,
    failure: Option<GeocodeError>,
    calls: Arc<AtomicUsize>,
}

impl GazetteerGeocoder {
    /// Create a geocoder over `places`. Places without coordinates are ignored.
    pub fn new(places: Vec<Placemark>) -> Self {
        let places = places
            .into_iter()
            .filter(|p| p.coordinates.is_some())
            .collect();
        Self {
            places: Arc::new(places),
            reverse_radius_m: DEFAULT_REVERSE_RADIUS_M,
            latency: None,
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the reverse search radius.
    pub fn with_reverse_radius(mut self, radius_m: f64) -> Self {
        self.reverse_radius_m = radius_m;
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every call with `error`.
    pub fn failing(mut self, error: GeocodeError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of calls (either direction) received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer<T>(&self, result: impl FnOnce() -> Result<T, GeocodeError>) -> Result<T, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => result(),
        }
    }

    fn nearest(&self, coordinates: Coordinates) -> Result<Vec<Placemark>, GeocodeError> {
        let mut hits: Vec<(f64, &Placemark)> = self
            .places
            .iter()
            .filter_map(|p| {
                let distance = p.coordinates?.distance_to(&coordinates);
                (distance <= self.reverse_radius_m).then_some((distance, p))
            })
            .collect();

        if hits.is_empty() {
            return Err(GeocodeError::NoResults);
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(hits.into_iter().map(|(_, p)| p.clone()).collect())
    }

    fn lookup(&self, address: &str) -> Result<GeocodedLocation, GeocodeError> {
        let needle = address.trim().to_lowercase();
        self.places
            .iter()
            .find(|p| {
                [
                    p.name.clone(),
                    p.thoroughfare.clone(),
                    p.locality.clone(),
                    Some(p.formatted_address()),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase() == needle)
            })
            .and_then(|p| {
                Some(GeocodedLocation {
                    coordinates: p.coordinates?,
                    radius: None,
                    placemark: Some(p.clone()),
                })
            })
            .ok_or(GeocodeError::NoResults)
    }
}

impl GeocodingService for GazetteerGeocoder {
    fn reverse_geocode(
        &self,
        coordinates: Coordinates,
    ) -> BoxFuture<'_, Result<Vec<Placemark>, GeocodeError>> {
        self.answer(move || self.nearest(coordinates)).boxed()
    }

    fn forward_geocode<'a>(
        &'a self,
        address: &'a str,
    ) -> BoxFuture<'a, Result<GeocodedLocation, GeocodeError>> {
        self.answer(move || self.lookup(address)).boxed()
    }
}
