//! Error types for location requests and their collaborators.
//!
//! [`LocationError`] is the error channel delivered to completion handlers.
//! Collaborator failures are wrapped verbatim ([`ProviderError`],
//! [`GeocodeError`]) and never retried here; retry policy belongs to the
//! caller.
//!
//! Violations of the operation lifecycle contract (finishing twice) are not
//! represented here. They are invariant breaches and panic instead.

use thiserror::Error;

/// Errors reported by a Location Provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The requested update mode is not supported on this provider.
    #[error("Location updates not supported")]
    Unsupported,

    /// The provider refused access (authorization withheld).
    #[error("Location access denied")]
    Denied,

    /// Any other provider-specific failure.
    #[error("Provider failure: {0}")]
    Failed(String),
}

/// Errors reported by a Geocoding Service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    /// The service answered but found nothing.
    #[error("No geocoding results")]
    NoResults,

    /// The service could not be reached.
    #[error("Geocoding network error: {0}")]
    Network(String),

    /// Any other service-specific failure.
    #[error("Geocoding failure: {0}")]
    Failed(String),
}

/// Errors delivered to request completion handlers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    /// The operation was stopped via `cancel()`, before or during execution.
    #[error("Operation cancelled")]
    Cancelled,

    /// Requested accuracy was not reached within the configured window.
    #[error("Timed out before reaching requested accuracy")]
    Timeout,

    /// The provider could not be started or subscribed.
    #[error("Location provider unavailable: {0}")]
    ProviderUnavailable(#[source] ProviderError),

    /// A running subscription reported an error event.
    #[error("Location provider failed: {0}")]
    ProviderFailed(#[source] ProviderError),

    /// The geocoding collaborator failed.
    #[error("Geocoding failed: {0}")]
    GeocodingFailed(#[source] GeocodeError),

    /// Input rejected before contacting any collaborator.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The start-of-work hook panicked; carries the panic message.
    #[error("Operation aborted: {0}")]
    Aborted(String),
}

/// Fieldless discriminant of [`LocationError`] for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Cancelled,
    Timeout,
    ProviderUnavailable,
    ProviderFailed,
    GeocodingFailed,
    InvalidInput,
    Aborted,
}

impl LocationError {
    /// Returns the error kind without payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout => ErrorKind::Timeout,
            Self::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Self::ProviderFailed(_) => ErrorKind::ProviderFailed,
            Self::GeocodingFailed(_) => ErrorKind::GeocodingFailed,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Aborted(_) => ErrorKind::Aborted,
        }
    }

    /// Returns true if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Errors constructing a [`LocationManager`](crate::manager::LocationManager)
/// or its dispatcher.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No tokio runtime is available to host execution contexts.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(LocationError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(LocationError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            LocationError::ProviderUnavailable(ProviderError::Unsupported).kind(),
            ErrorKind::ProviderUnavailable
        );
        assert_eq!(
            LocationError::GeocodingFailed(GeocodeError::NoResults).kind(),
            ErrorKind::GeocodingFailed
        );
        assert_eq!(
            LocationError::InvalidInput("empty".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            LocationError::Aborted("boom".into()).kind(),
            ErrorKind::Aborted
        );
    }

    #[test]
    fn test_geocoding_error_forwards_source() {
        let err = LocationError::GeocodingFailed(GeocodeError::Network("offline".into()));
        assert!(err.to_string().contains("offline"));

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "Geocoding network error: offline");
    }

    #[test]
    fn test_predicates() {
        assert!(LocationError::Cancelled.is_cancelled());
        assert!(!LocationError::Cancelled.is_timeout());
        assert!(LocationError::Timeout.is_timeout());
    }
}
