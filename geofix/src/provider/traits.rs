//! Collaborator traits.

use futures::future::BoxFuture;

use super::subscription::LocationSubscription;
use crate::error::{GeocodeError, ProviderError};
use crate::location::{Coordinates, GeocodedLocation, Placemark};

/// Source of position fixes.
///
/// Both start methods are called from a request's execution context (or the
/// significant-change registry) inside a tokio runtime, so implementations
/// may spawn tasks to feed the returned subscription.
pub trait LocationProvider: Send + Sync {
    /// Start continuous updates.
    ///
    /// `accuracy_hint` is the accuracy the caller is waiting for; providers
    /// may use it to pick a power mode.
    fn start_updates(&self, accuracy_hint: f64) -> Result<LocationSubscription, ProviderError>;

    /// Start low-frequency significant-change updates.
    fn start_significant_change_updates(&self) -> Result<LocationSubscription, ProviderError>;
}

/// Address <-> coordinate resolution.
///
/// Methods return boxed futures so the trait stays object safe
/// (`Arc<dyn GeocodingService>`).
pub trait GeocodingService: Send + Sync {
    /// Resolve a coordinate to candidate placemarks, best match first.
    fn reverse_geocode(
        &self,
        coordinates: Coordinates,
    ) -> BoxFuture<'_, Result<Vec<Placemark>, GeocodeError>>;

    /// Resolve free-form address text to a location.
    fn forward_geocode<'a>(
        &'a self,
        address: &'a str,
    ) -> BoxFuture<'a, Result<GeocodedLocation, GeocodeError>>;
}
