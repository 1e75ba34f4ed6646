//! Location Provider and Geocoding Service abstraction.
//!
//! Positioning hardware and geocoding backends are external collaborators.
//! This module defines the interface the core consumes ([`LocationProvider`],
//! [`GeocodingService`], [`LocationSubscription`]) plus two in-process
//! implementations used by the CLI and by tests:
//!
//! - [`SimulatedProvider`]: scripted or push-driven position streams
//! - [`GazetteerGeocoder`]: an in-memory place table
//!
//! # Example
//!
//! ```ignore
//! use geofix::provider::{LocationProvider, SimulatedProvider};
//!
//! let provider = SimulatedProvider::new();
//! let mut subscription = provider.start_updates(100.0)?;
//! provider.emit(Ok(sample));
//! let event = subscription.next().await;
//! ```

mod gazetteer;
mod simulated;
mod subscription;
mod traits;

pub use gazetteer::GazetteerGeocoder;
pub use simulated::{ScriptedEvent, SimulatedProvider};
pub use subscription::{LocationEvent, LocationSubscription};
pub use traits::{GeocodingService, LocationProvider};
