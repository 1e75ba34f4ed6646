//! Geofix - asynchronous location acquisition and geocoding coordination.
//!
//! The library obtains a caller's position from a [`LocationProvider`],
//! optionally resolves it to and from addresses through a
//! [`GeocodingService`], and fans low-frequency significant-change events out
//! to many observers.
//!
//! # Architecture
//!
//! ```text
//! LocationManager ──► RequestDispatcher ──► Operation<LocationRequest> (one task each)
//!       │                                          │
//!       │                                          ├──► LocationCache (shared)
//!       │                                          ├──► LocationProvider
//!       │                                          └──► GeocodingService
//!       └──► SignificantChangeRegistry ──► one shared significant-change subscription
//! ```
//!
//! Every request runs the same cancellable lifecycle (`Inited` → `Executing`
//! → `Finished`) on its own execution context; `cancel()` may be called from
//! any thread at any time and the completion handler fires exactly once.

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod location;
pub mod logging;
pub mod manager;
pub mod operation;
pub mod provider;
pub mod request;
pub mod significant;

pub use cache::LocationCache;
pub use config::ManagerConfig;
pub use error::{ErrorKind, GeocodeError, LocationError, ManagerError, ProviderError};
pub use location::{accuracy, Coordinates, GeocodedLocation, LocationSample, Placemark};
pub use manager::{LocationManager, RequestHandle};
pub use operation::{OperationHandle, OperationState};
pub use provider::{
    GazetteerGeocoder, GeocodingService, LocationEvent, LocationProvider, LocationSubscription,
    SimulatedProvider,
};
pub use request::{AddressLookup, CurrentLocationOptions, LocationFix, RequestKind, RequestOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
