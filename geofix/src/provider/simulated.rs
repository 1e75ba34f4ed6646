//! Simulated Location Provider.
//!
//! Feeds subscriptions from two sources:
//! - a script replayed (with per-event delays) into every new continuous
//!   subscription
//! - events pushed at runtime via [`SimulatedProvider::emit`] and
//!   [`SimulatedProvider::emit_significant`]
//!
//! The provider counts starts and live subscriptions so callers can verify
//! that requests subscribe, unsubscribe and bypass the provider as expected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::subscription::{LocationEvent, LocationSubscription};
use super::traits::LocationProvider;
use crate::error::ProviderError;

/// One step of a replay script.
#[derive(Debug, Clone)]
pub struct ScriptedEvent {
    /// Delay after the previous step (or after subscribing, for the first).
    pub delay: Duration,
    /// Event to deliver.
    pub event: LocationEvent,
}

impl ScriptedEvent {
    /// A step delivering `event` after `delay`.
    pub fn after(delay: Duration, event: LocationEvent) -> Self {
        Self { delay, event }
    }
}

#[derive(Default)]
struct SimState {
    start_error: Option<ProviderError>,
    significant_error: Option<ProviderError>,
    script: Vec<ScriptedEvent>,
    continuous: Vec<mpsc::UnboundedSender<LocationEvent>>,
    significant: Vec<mpsc::UnboundedSender<LocationEvent>>,
    last_accuracy_hint: Option<f64>,
}

/// In-process Location Provider.
#[derive(Clone, Default)]
pub struct SimulatedProvider {
    state: Arc<Mutex<SimState>>,
    starts: Arc<AtomicUsize>,
    significant_starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl SimulatedProvider {
    /// A provider with no script; events arrive only via `emit`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider replaying `script` into each continuous subscription.
    pub fn with_script(script: Vec<ScriptedEvent>) -> Self {
        let provider = Self::new();
        provider.state.lock().script = script;
        provider
    }

    /// Make every start method fail with `error`.
    pub fn unavailable(self, error: ProviderError) -> Self {
        {
            let mut state = self.state.lock();
            state.start_error = Some(error.clone());
            state.significant_error = Some(error);
        }
        self
    }

    /// Make only significant-change monitoring fail with `Unsupported`.
    pub fn without_significant_changes(self) -> Self {
        self.state.lock().significant_error = Some(ProviderError::Unsupported);
        self
    }

    /// Deliver `event` to every live continuous subscription.
    ///
    /// Returns the number of subscriptions that received it.
    pub fn emit(&self, event: LocationEvent) -> usize {
        let mut state = self.state.lock();
        broadcast(&mut state.continuous, event)
    }

    /// Deliver `event` to every live significant-change subscription.
    pub fn emit_significant(&self, event: LocationEvent) -> usize {
        let mut state = self.state.lock();
        broadcast(&mut state.significant, event)
    }

    /// End every live continuous stream, as a provider shutting down would.
    ///
    /// Replays already in progress keep their own sender until they finish.
    pub fn close_updates(&self) {
        self.state.lock().continuous.clear();
    }

    /// End every live significant-change stream.
    pub fn close_significant(&self) {
        self.state.lock().significant.clear();
    }

    /// Number of continuous subscriptions started so far.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of significant-change subscriptions started so far.
    pub fn significant_start_count(&self) -> usize {
        self.significant_starts.load(Ordering::SeqCst)
    }

    /// Number of subscriptions (of either kind) stopped so far.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Continuous subscriptions whose receiver is still open.
    pub fn active_subscriptions(&self) -> usize {
        let state = self.state.lock();
        state.continuous.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Significant-change subscriptions whose receiver is still open.
    pub fn active_significant_subscriptions(&self) -> usize {
        let state = self.state.lock();
        state.significant.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Accuracy hint passed to the most recent `start_updates`.
    pub fn last_accuracy_hint(&self) -> Option<f64> {
        self.state.lock().last_accuracy_hint
    }

    fn subscription(&self, rx: mpsc::UnboundedReceiver<LocationEvent>) -> LocationSubscription {
        let stops = Arc::clone(&self.stops);
        LocationSubscription::with_stop_hook(rx, move || {
            stops.fetch_add(1, Ordering::SeqCst);
        })
    }
}

impl LocationProvider for SimulatedProvider {
    fn start_updates(&self, accuracy_hint: f64) -> Result<LocationSubscription, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let script = {
            let mut state = self.state.lock();
            if let Some(err) = &state.start_error {
                return Err(err.clone());
            }
            state.last_accuracy_hint = Some(accuracy_hint);
            state.continuous.push(tx.clone());
            state.script.clone()
        };

        if !script.is_empty() {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|e| ProviderError::Failed(format!("no runtime for replay: {}", e)))?;
            handle.spawn(replay(script, tx));
        }

        self.starts.fetch_add(1, Ordering::SeqCst);
        debug!(accuracy_hint, "Simulated provider: continuous updates started");
        Ok(self.subscription(rx))
    }

    fn start_significant_change_updates(&self) -> Result<LocationSubscription, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock();
            if let Some(err) = &state.significant_error {
                return Err(err.clone());
            }
            state.significant.push(tx);
        }

        self.significant_starts.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated provider: significant-change updates started");
        Ok(self.subscription(rx))
    }
}

fn broadcast(senders: &mut Vec<mpsc::UnboundedSender<LocationEvent>>, event: LocationEvent) -> usize {
    senders.retain(|tx| !tx.is_closed());
    senders
        .iter()
        .filter(|tx| tx.send(event.clone()).is_ok())
        .count()
}

async fn replay(script: Vec<ScriptedEvent>, tx: mpsc::UnboundedSender<LocationEvent>) {
    for step in script {
        tokio::time::sleep(step.delay).await;
        if tx.send(step.event).is_err() {
            trace!("Simulated provider: subscriber gone, replay stopped");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{Coordinates, LocationSample};

    fn fix(accuracy: f64) -> LocationSample {
        LocationSample::new(Coordinates::new(48.85, 2.35), accuracy)
    }

    #[tokio::test]
    async fn test_emit_reaches_live_subscriptions() {
        let provider = SimulatedProvider::new();
        let mut a = provider.start_updates(100.0).unwrap();
        let mut b = provider.start_updates(10.0).unwrap();
        assert_eq!(provider.start_count(), 2);
        assert_eq!(provider.last_accuracy_hint(), Some(10.0));

        let sample = fix(25.0);
        assert_eq!(provider.emit(Ok(sample)), 2);
        assert_eq!(a.next().await, Some(Ok(sample)));
        assert_eq!(b.next().await, Some(Ok(sample)));

        a.stop();
        assert_eq!(provider.active_subscriptions(), 1);
        assert_eq!(provider.emit(Ok(sample)), 1);
        assert_eq!(provider.stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_replays_with_delays() {
        let first = fix(500.0);
        let second = fix(20.0);
        let provider = SimulatedProvider::with_script(vec![
            ScriptedEvent::after(Duration::from_secs(1), Ok(first)),
            ScriptedEvent::after(Duration::from_secs(2), Ok(second)),
        ]);

        let start = tokio::time::Instant::now();
        let mut subscription = provider.start_updates(50.0).unwrap();

        assert_eq!(subscription.next().await, Some(Ok(first)));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(subscription.next().await, Some(Ok(second)));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unavailable_provider_refuses_to_start() {
        let provider = SimulatedProvider::new().unavailable(ProviderError::Denied);
        assert_eq!(
            provider.start_updates(10.0).unwrap_err(),
            ProviderError::Denied
        );
        assert_eq!(
            provider.start_significant_change_updates().unwrap_err(),
            ProviderError::Denied
        );
        assert_eq!(provider.start_count(), 0);
    }

    #[tokio::test]
    async fn test_significant_changes_can_be_unsupported() {
        let provider = SimulatedProvider::new().without_significant_changes();
        assert!(provider.start_updates(10.0).is_ok());
        assert_eq!(
            provider.start_significant_change_updates().unwrap_err(),
            ProviderError::Unsupported
        );
    }

    #[tokio::test]
    async fn test_significant_stream_is_separate() {
        let provider = SimulatedProvider::new();
        let mut continuous = provider.start_updates(10.0).unwrap();
        let mut significant = provider.start_significant_change_updates().unwrap();

        assert_eq!(provider.emit_significant(Err(ProviderError::Denied)), 1);
        assert_eq!(
            significant.next().await,
            Some(Err(ProviderError::Denied))
        );

        continuous.stop();
        assert_eq!(continuous.next().await, None);
        assert_eq!(provider.active_significant_subscriptions(), 1);
    }
}
