//! Request kinds and their parameters.

use std::time::Duration;

use crate::location::{accuracy, LocationSample};

/// Default time allowed to reach the requested accuracy (10 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters for a current-location request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentLocationOptions {
    /// Required accuracy in metres; a fix satisfies it when `<=`.
    pub accuracy: f64,
    /// Give up after this long without a satisfying fix.
    pub timeout: Duration,
    /// Serve a fresh-enough cached fix instead of subscribing.
    pub use_cache: bool,
    /// Also reverse-geocode the fix to a placemark.
    pub reverse: bool,
}

impl Default for CurrentLocationOptions {
    fn default() -> Self {
        Self {
            accuracy: accuracy::HUNDRED_METERS,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            use_cache: true,
            reverse: false,
        }
    }
}

impl CurrentLocationOptions {
    /// Options requiring `accuracy`, other fields default.
    pub fn with_accuracy(accuracy: f64) -> Self {
        Self {
            accuracy,
            ..Self::default()
        }
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set whether the cache may answer.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Set whether to reverse-geocode the fix.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

/// What a request does.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    /// Obtain the current position, optionally reverse-geocoded.
    CurrentLocationAndReverse(CurrentLocationOptions),
    /// Reverse-geocode a known sample.
    ReverseLocation {
        /// Sample to resolve.
        sample: LocationSample,
    },
    /// Forward-geocode an address.
    CoordinatesFromAddress {
        /// Free-form address text.
        address: String,
    },
}

impl RequestKind {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CurrentLocationAndReverse(_) => "current-location",
            Self::ReverseLocation { .. } => "reverse-geocode",
            Self::CoordinatesFromAddress { .. } => "forward-geocode",
        }
    }
}
