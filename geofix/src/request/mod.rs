//! Location requests: the three request kinds sharing one lifecycle.
//!
//! A [`LocationRequest`] is the [`OperationHooks`](crate::operation::OperationHooks)
//! implementation for every [`RequestKind`]. It owns the accuracy, timeout
//! and cache policy and drives the Location Provider and Geocoding Service.
//!
//! # Flow (current location)
//!
//! ```text
//! start ──► cache lookup ──► hit ──► [reverse geocode] ──► finish
//!                 │
//!                 └─► miss ──► subscribe ──► samples ... ──► accurate ──► unsubscribe
//!                                  │                                    │
//!                                  └─► timeout ──► finish(Timeout)      ▼
//!                                                              [reverse geocode] ──► finish
//! ```
//!
//! On success the observed sample is offered to the shared
//! [`LocationCache`](crate::cache::LocationCache).

mod kind;
mod outcome;
mod request;

pub use kind::{CurrentLocationOptions, RequestKind, DEFAULT_REQUEST_TIMEOUT};
pub use outcome::{AddressLookup, LocationFix, RequestOutcome};
pub use request::{LocationRequest, RequestServices};
