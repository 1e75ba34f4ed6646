//! [`LocationRequest`]: the hooks implementation for every request kind.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use super::kind::{CurrentLocationOptions, RequestKind};
use super::outcome::{AddressLookup, LocationFix, RequestOutcome};
use crate::cache::LocationCache;
use crate::error::{GeocodeError, LocationError, ProviderError};
use crate::location::{Coordinates, GeocodedLocation, LocationSample};
use crate::operation::OperationHooks;
use crate::provider::{GeocodingService, LocationProvider, LocationSubscription};

/// Collaborators shared by every request of one manager.
#[derive(Clone)]
pub struct RequestServices {
    /// Shared single-slot cache.
    pub cache: Arc<LocationCache>,
    /// Location Provider.
    pub provider: Arc<dyn LocationProvider>,
    /// Geocoding Service.
    pub geocoder: Arc<dyn GeocodingService>,
}

impl RequestServices {
    pub fn new(
        cache: Arc<LocationCache>,
        provider: Arc<dyn LocationProvider>,
        geocoder: Arc<dyn GeocodingService>,
    ) -> Self {
        Self {
            cache,
            provider,
            geocoder,
        }
    }
}

impl fmt::Debug for RequestServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestServices")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// A location request of any kind.
///
/// Wrap it in an [`Operation`](crate::operation::Operation) to run it.
pub struct LocationRequest {
    kind: RequestKind,
    services: RequestServices,
    subscription: Option<LocationSubscription>,
    /// Last fix observed (or served from the cache).
    last_sample: Option<LocationSample>,
    from_cache: bool,
    address: Option<AddressLookup>,
    geocoded: Option<GeocodedLocation>,
}

impl LocationRequest {
    pub fn new(kind: RequestKind, services: RequestServices) -> Self {
        Self {
            kind,
            services,
            subscription: None,
            last_sample: None,
            from_cache: false,
            address: None,
            geocoded: None,
        }
    }

    /// The request's kind.
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    async fn locate(&mut self, options: CurrentLocationOptions) -> Result<(), LocationError> {
        if options.use_cache {
            if let Some(sample) = self.services.cache.lookup(options.accuracy) {
                debug!(
                    accuracy = sample.accuracy,
                    age_ms = sample.age().as_millis() as u64,
                    "Serving location from cache"
                );
                self.last_sample = Some(sample);
                self.from_cache = true;
                return self.resolve_fix(options.reverse, sample.coordinates).await;
            }
        }

        let subscription = self
            .services
            .provider
            .start_updates(options.accuracy)
            .map_err(|e| {
                warn!(error = %e, "Location provider refused to start");
                LocationError::ProviderUnavailable(e)
            })?;
        let subscription = self.subscription.insert(subscription);

        let deadline = tokio::time::sleep(options.timeout);
        tokio::pin!(deadline);

        let fix = loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!(
                        timeout_ms = options.timeout.as_millis() as u64,
                        last_accuracy = ?self.last_sample.map(|s| s.accuracy),
                        "Requested accuracy not reached in time"
                    );
                    return Err(LocationError::Timeout);
                }
                event = subscription.next() => match event {
                    Some(Ok(sample)) => {
                        self.last_sample = Some(sample);
                        if sample.satisfies(options.accuracy) {
                            break sample;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Location provider reported an error");
                        return Err(LocationError::ProviderFailed(e));
                    }
                    None => {
                        return Err(LocationError::ProviderUnavailable(ProviderError::Failed(
                            "update stream closed".to_string(),
                        )));
                    }
                }
            }
        };

        debug!(accuracy = fix.accuracy, "Location fix reached requested accuracy");
        self.stop_updates();
        self.resolve_fix(options.reverse, fix.coordinates).await
    }

    async fn resolve_fix(&mut self, reverse: bool, coordinates: Coordinates) -> Result<(), LocationError> {
        if reverse {
            self.address = Some(lookup_address(&*self.services.geocoder, coordinates).await?);
        }
        Ok(())
    }

    async fn reverse(&mut self, sample: LocationSample) -> Result<(), LocationError> {
        if !sample.coordinates.is_valid() {
            return Err(LocationError::InvalidInput(format!(
                "coordinates out of range: {}",
                sample.coordinates
            )));
        }
        self.address = Some(lookup_address(&*self.services.geocoder, sample.coordinates).await?);
        Ok(())
    }

    async fn forward(&mut self, address: String) -> Result<(), LocationError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(LocationError::InvalidInput("address is empty".to_string()));
        }

        let location = self
            .services
            .geocoder
            .forward_geocode(address)
            .await
            .map_err(LocationError::GeocodingFailed)?;
        debug!(coordinates = %location.coordinates, "Address resolved");
        self.geocoded = Some(location);
        Ok(())
    }

    fn stop_updates(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.stop();
        }
    }

    /// The sample a successful request offers to the cache.
    fn cacheable_sample(&self) -> Option<LocationSample> {
        match &self.kind {
            RequestKind::CurrentLocationAndReverse(_) if !self.from_cache => self.last_sample,
            _ => None,
        }
    }
}

async fn lookup_address(
    geocoder: &dyn GeocodingService,
    coordinates: Coordinates,
) -> Result<AddressLookup, LocationError> {
    let placemarks = geocoder
        .reverse_geocode(coordinates)
        .await
        .map_err(LocationError::GeocodingFailed)?;
    debug!(candidates = placemarks.len(), "Reverse geocode answered");
    AddressLookup::from_placemarks(placemarks)
        .ok_or(LocationError::GeocodingFailed(GeocodeError::NoResults))
}

impl OperationHooks for LocationRequest {
    type Output = RequestOutcome;

    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn operation_did_start(&mut self) -> BoxFuture<'_, Result<(), LocationError>> {
        match self.kind.clone() {
            RequestKind::CurrentLocationAndReverse(options) => self.locate(options).boxed(),
            RequestKind::ReverseLocation { sample } => self.reverse(sample).boxed(),
            RequestKind::CoordinatesFromAddress { address } => self.forward(address).boxed(),
        }
    }

    fn operation_was_cancelled(&mut self) {
        debug!(
            kind = self.kind.name(),
            last_accuracy = ?self.last_sample.map(|s| s.accuracy),
            "Request cancelled"
        );
        self.stop_updates();
    }

    fn operation_will_finish(&mut self, error: Option<&LocationError>) {
        self.stop_updates();
        if error.is_none() {
            if let Some(sample) = self.cacheable_sample() {
                self.services.cache.write(sample);
            }
        }
    }

    fn into_output(self, error: Option<LocationError>) -> RequestOutcome {
        match self.kind {
            RequestKind::CurrentLocationAndReverse(_) => RequestOutcome::Location(LocationFix {
                location: self.last_sample,
                placemark: self.address.map(|lookup| lookup.placemark),
                from_cache: self.from_cache,
                error,
            }),
            RequestKind::ReverseLocation { .. } => RequestOutcome::Address(match error {
                Some(e) => Err(e),
                None => self
                    .address
                    .ok_or(LocationError::GeocodingFailed(GeocodeError::NoResults)),
            }),
            RequestKind::CoordinatesFromAddress { .. } => {
                RequestOutcome::Coordinates(match error {
                    Some(e) => Err(e),
                    None => self
                        .geocoded
                        .ok_or(LocationError::GeocodingFailed(GeocodeError::NoResults)),
                })
            }
        }
    }
}

impl fmt::Debug for LocationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationRequest")
            .field("kind", &self.kind)
            .field("last_sample", &self.last_sample)
            .field("from_cache", &self.from_cache)
            .finish_non_exhaustive()
    }
}
