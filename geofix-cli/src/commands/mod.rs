//! CLI command implementations.
//!
//! - [`locate`] - Position fix from the simulated receiver
//! - [`geocode`] - Reverse and forward geocoding against the built-in gazetteer
//! - [`watch`] - Significant-change monitoring along a simulated route

pub mod common;
pub mod geocode;
pub mod locate;
pub mod watch;
