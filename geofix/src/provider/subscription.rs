//! Handle to a running provider update stream.

use std::fmt;

use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::location::LocationSample;

/// One item of a provider stream: a fix or an error event.
pub type LocationEvent = Result<LocationSample, ProviderError>;

type StopHook = Box<dyn FnOnce() + Send>;

/// A live provider subscription.
///
/// Events arrive through a channel fed by the provider. Stopping (explicitly
/// or by dropping the subscription) closes the channel and runs the
/// provider's stop hook exactly once.
pub struct LocationSubscription {
    events: mpsc::UnboundedReceiver<LocationEvent>,
    on_stop: Option<StopHook>,
}

impl LocationSubscription {
    /// Wrap an event channel with no stop hook.
    pub fn new(events: mpsc::UnboundedReceiver<LocationEvent>) -> Self {
        Self {
            events,
            on_stop: None,
        }
    }

    /// Wrap an event channel; `on_stop` runs when the subscription stops.
    pub fn with_stop_hook(
        events: mpsc::UnboundedReceiver<LocationEvent>,
        on_stop: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            on_stop: Some(Box::new(on_stop)),
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the provider closed the stream or the subscription
    /// was stopped.
    pub async fn next(&mut self) -> Option<LocationEvent> {
        self.events.recv().await
    }

    /// Stop receiving updates. Idempotent.
    pub fn stop(&mut self) {
        self.events.close();
        if let Some(hook) = self.on_stop.take() {
            hook();
        }
    }

    /// Returns true once `stop()` has run.
    pub fn is_stopped(&self) -> bool {
        self.on_stop.is_none() && self.events.is_closed()
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for LocationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationSubscription")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
