//! The location manager: an explicit context object tying the pieces together.
//!
//! A [`LocationManager`] owns one cache, one dispatcher and one
//! significant-change registry, all bound to the provider and geocoder it was
//! built with. Independent managers share nothing, so tests can run several
//! side by side.
//!
//! # Example
//!
//! ```ignore
//! use geofix::{LocationManager, ManagerConfig, SimulatedProvider, GazetteerGeocoder};
//!
//! let manager = LocationManager::new(
//!     ManagerConfig::default(),
//!     Arc::new(SimulatedProvider::new()),
//!     Arc::new(GazetteerGeocoder::new(places)),
//! )?;
//!
//! let handle = manager.submit_current_location(true, accuracy::HUNDRED_METERS, true, |fix| {
//!     println!("{:?}", fix.location);
//! });
//! handle.cancel();
//!
//! manager.shutdown();
//! ```

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::info;

use crate::cache::LocationCache;
use crate::config::ManagerConfig;
use crate::dispatcher::RequestDispatcher;
use crate::error::{LocationError, ManagerError};
use crate::location::{GeocodedLocation, LocationSample};
use crate::operation::{Operation, OperationHandle};
use crate::provider::{GeocodingService, LocationEvent, LocationProvider};
use crate::request::{
    AddressLookup, CurrentLocationOptions, LocationFix, LocationRequest, RequestKind,
    RequestOutcome, RequestServices,
};
use crate::significant::SignificantChangeRegistry;

/// Handle to a submitted request.
pub type RequestHandle = OperationHandle;

/// Location context object.
pub struct LocationManager {
    config: ManagerConfig,
    services: RequestServices,
    dispatcher: RequestDispatcher,
    significant: SignificantChangeRegistry,
}

impl LocationManager {
    /// Create a manager on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoRuntime`] when called outside a runtime.
    pub fn new(
        config: ManagerConfig,
        provider: Arc<dyn LocationProvider>,
        geocoder: Arc<dyn GeocodingService>,
    ) -> Result<Self, ManagerError> {
        let runtime = Handle::try_current().map_err(|e| ManagerError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(config, provider, geocoder, runtime))
    }

    /// Create a manager whose execution contexts run on `runtime`.
    pub fn with_handle(
        config: ManagerConfig,
        provider: Arc<dyn LocationProvider>,
        geocoder: Arc<dyn GeocodingService>,
        runtime: Handle,
    ) -> Self {
        let cache = Arc::new(LocationCache::new(config.max_cache_age));
        let dispatcher = RequestDispatcher::with_handle(runtime.clone(), config.max_concurrent_requests);
        let significant = SignificantChangeRegistry::new(Arc::clone(&provider), runtime);

        info!(
            max_cache_age_secs = config.max_cache_age.as_secs(),
            default_timeout_secs = config.default_timeout.as_secs(),
            max_concurrent_requests = ?config.max_concurrent_requests,
            "Location manager started"
        );

        Self {
            services: RequestServices::new(cache, provider, geocoder),
            dispatcher,
            significant,
            config,
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Submit a request of any kind.
    ///
    /// Never blocks. After [`shutdown`](Self::shutdown) the request completes
    /// with [`LocationError::Cancelled`] without doing any work.
    pub fn submit(
        &self,
        kind: RequestKind,
        on_complete: impl FnOnce(RequestOutcome) + Send + 'static,
    ) -> RequestHandle {
        let request = LocationRequest::new(kind, self.services.clone());
        let operation = Operation::with_cancellation(request, self.dispatcher.child_token(), on_complete);
        let handle = operation.handle();
        self.dispatcher.submit(&operation);
        handle
    }

    /// Request the current location using the configured default timeout.
    pub fn submit_current_location(
        &self,
        reverse: bool,
        accuracy: f64,
        use_cache: bool,
        on_complete: impl FnOnce(LocationFix) + Send + 'static,
    ) -> RequestHandle {
        let options = CurrentLocationOptions {
            accuracy,
            timeout: self.config.default_timeout,
            use_cache,
            reverse,
        };
        self.submit_current_location_with(options, on_complete)
    }

    /// Request the current location with explicit options.
    pub fn submit_current_location_with(
        &self,
        options: CurrentLocationOptions,
        on_complete: impl FnOnce(LocationFix) + Send + 'static,
    ) -> RequestHandle {
        self.submit(RequestKind::CurrentLocationAndReverse(options), move |outcome| match outcome {
            RequestOutcome::Location(fix) => on_complete(fix),
            other => unreachable!("current-location request completed with {:?}", other),
        })
    }

    /// Resolve a sample to a placemark.
    pub fn submit_reverse_geocode(
        &self,
        sample: LocationSample,
        on_complete: impl FnOnce(Result<AddressLookup, LocationError>) + Send + 'static,
    ) -> RequestHandle {
        self.submit(RequestKind::ReverseLocation { sample }, move |outcome| match outcome {
            RequestOutcome::Address(result) => on_complete(result),
            other => unreachable!("reverse-geocode request completed with {:?}", other),
        })
    }

    /// Resolve an address to coordinates.
    pub fn submit_forward_geocode(
        &self,
        address: impl Into<String>,
        on_complete: impl FnOnce(Result<GeocodedLocation, LocationError>) + Send + 'static,
    ) -> RequestHandle {
        let kind = RequestKind::CoordinatesFromAddress {
            address: address.into(),
        };
        self.submit(kind, move |outcome| match outcome {
            RequestOutcome::Coordinates(result) => on_complete(result),
            other => unreachable!("forward-geocode request completed with {:?}", other),
        })
    }

    /// Await a current-location request.
    pub async fn current_location(&self, options: CurrentLocationOptions) -> LocationFix {
        let (tx, rx) = oneshot::channel();
        self.submit_current_location_with(options, move |fix| {
            let _ = tx.send(fix);
        });
        rx.await.unwrap_or(LocationFix {
            location: None,
            placemark: None,
            from_cache: false,
            error: Some(LocationError::Cancelled),
        })
    }

    /// Await a reverse-geocode request.
    pub async fn reverse_geocode(&self, sample: LocationSample) -> Result<AddressLookup, LocationError> {
        let (tx, rx) = oneshot::channel();
        self.submit_reverse_geocode(sample, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(LocationError::Cancelled))
    }

    /// Await a forward-geocode request.
    pub async fn forward_geocode(
        &self,
        address: impl Into<String>,
    ) -> Result<GeocodedLocation, LocationError> {
        let (tx, rx) = oneshot::channel();
        self.submit_forward_geocode(address, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(LocationError::Cancelled))
    }

    /// Register a significant-change observer. See [`SignificantChangeRegistry::register`].
    pub fn register_significant_change_observer(
        &self,
        handler: impl FnMut(&LocationEvent) -> ControlFlow<()> + Send + 'static,
    ) -> bool {
        self.significant.register(handler)
    }

    /// Remove every significant-change observer.
    pub fn unregister_all_significant_change_observers(&self) {
        self.significant.unregister_all();
    }

    /// Maximum age for serving a cached fix.
    pub fn max_cache_age(&self) -> Duration {
        self.services.cache.max_age()
    }

    /// Change the maximum cache age.
    pub fn set_max_cache_age(&self, max_age: Duration) {
        self.services.cache.set_max_age(max_age);
    }

    /// The cached fix, regardless of age.
    pub fn cached_location(&self) -> Option<LocationSample> {
        self.services.cache.cached_location()
    }

    /// Age of the cached fix.
    pub fn cached_location_age(&self) -> Option<Duration> {
        self.services.cache.cached_location_age()
    }

    pub fn cache(&self) -> &LocationCache {
        &self.services.cache
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn significant_changes(&self) -> &SignificantChangeRegistry {
        &self.significant
    }

    /// Dispose: drop every observer and cancel every in-flight request.
    ///
    /// Cancellation is asynchronous; completions still arrive, with
    /// [`LocationError::Cancelled`].
    pub fn shutdown(&self) {
        if self.dispatcher.is_shut_down() {
            return;
        }
        self.significant.unregister_all();
        self.dispatcher.shutdown();
        info!("Location manager stopped");
    }
}

impl Drop for LocationManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for LocationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationManager")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("significant", &self.significant)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Coordinates;
    use crate::provider::{GazetteerGeocoder, SimulatedProvider};

    fn manager(provider: &SimulatedProvider) -> LocationManager {
        LocationManager::new(
            ManagerConfig::default().with_default_timeout(Duration::from_secs(3)),
            Arc::new(provider.clone()),
            Arc::new(GazetteerGeocoder::new(Vec::new())),
        )
        .unwrap()
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = LocationManager::new(
            ManagerConfig::default(),
            Arc::new(SimulatedProvider::new()),
            Arc::new(GazetteerGeocoder::new(Vec::new())),
        );
        assert!(matches!(result, Err(ManagerError::NoRuntime(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_applies() {
        let provider = SimulatedProvider::new();
        let manager = manager(&provider);

        let start = tokio::time::Instant::now();
        let fix = manager
            .current_location(CurrentLocationOptions {
                timeout: manager.config().default_timeout,
                ..CurrentLocationOptions::default()
            })
            .await;

        assert_eq!(fix.error, Some(LocationError::Timeout));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_oversized_concurrency_limit_is_capped() {
        let provider = SimulatedProvider::new();
        let manager = LocationManager::with_handle(
            ManagerConfig::default().with_max_concurrent_requests(usize::MAX),
            Arc::new(provider.clone()),
            Arc::new(GazetteerGeocoder::new(Vec::new())),
            Handle::current(),
        );
        assert_eq!(
            manager.dispatcher().concurrency_limit(),
            Some(tokio::sync::Semaphore::MAX_PERMITS)
        );

        let result = manager.forward_geocode("nowhere").await;
        assert!(matches!(result, Err(LocationError::GeocodingFailed(_))));
    }

    #[tokio::test]
    async fn test_cache_accessors() {
        let provider = SimulatedProvider::new();
        let manager = manager(&provider);
        assert_eq!(manager.max_cache_age(), Duration::from_secs(60));

        manager.set_max_cache_age(Duration::from_secs(5));
        assert_eq!(manager.max_cache_age(), Duration::from_secs(5));
        assert!(manager.cached_location().is_none());

        let sample = LocationSample::new(Coordinates::new(1.0, 2.0), 10.0);
        manager.cache().write(sample);
        assert_eq!(manager.cached_location(), Some(sample));
        assert!(manager.cached_location_age().is_some());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_cancelled() {
        let provider = SimulatedProvider::new();
        let manager = manager(&provider);
        manager.shutdown();

        let fix = manager.current_location(CurrentLocationOptions::default()).await;
        assert_eq!(fix.error, Some(LocationError::Cancelled));
        assert_eq!(provider.start_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drops_observers() {
        let provider = SimulatedProvider::new();
        let manager = manager(&provider);
        assert!(manager.register_significant_change_observer(|_| ControlFlow::Continue(())));
        assert!(manager.significant_changes().is_monitoring());

        manager.shutdown();
        assert_eq!(manager.significant_changes().observer_count(), 0);
        assert!(!manager.significant_changes().is_monitoring());
    }
}
