//! Significant-change fan-out.
//!
//! One provider significant-change subscription is shared by every
//! registered observer. The subscription starts lazily with the first
//! registration and stops when the last observer leaves.
//!
//! # Dispatch Rounds
//!
//! A pump task reads the subscription. For each event it takes the observer
//! list out of the registry, invokes every handler in registration order
//! *without* holding the registry lock, then puts back the handlers that did
//! not ask to stop. Handlers registered during a round (including from inside
//! a handler) are appended and first see the next event.
//!
//! ```text
//! provider ──► pump ──► take observers ──► h1(event) h2(event) ... ──► merge
//!                                               │                       │
//!                                      Break ⇒ removed       + newly registered
//! ```
//!
//! Every subscription carries a generation number. `unregister_all` bumps it,
//! so a round in progress discards its observers instead of restoring them.

use std::fmt;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ProviderError;
use crate::provider::{LocationEvent, LocationProvider, LocationSubscription};

/// Observer callback. Returning `ControlFlow::Break(())` removes it after the
/// current round.
pub type SignificantChangeHandler = Box<dyn FnMut(&LocationEvent) -> ControlFlow<()> + Send>;

struct Observer {
    id: u64,
    handler: SignificantChangeHandler,
    active: bool,
}

impl Observer {
    /// Invoke the handler. Returns whether the observer stays registered.
    fn notify(&mut self, event: &LocationEvent) -> bool {
        let handler = &mut self.handler;
        match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => {
                debug!(observer = self.id, "Observer asked to stop");
                self.active = false;
            }
            Err(_) => {
                error!(observer = self.id, "Significant-change handler panicked, removing it");
                self.active = false;
            }
        }
        self.active
    }
}

#[derive(Default)]
struct RegistryState {
    observers: Vec<Observer>,
    /// Observers taken out for the round in progress.
    dispatching: usize,
    generation: u64,
    pump: Option<CancellationToken>,
    next_observer_id: u64,
}

/// Registry of significant-change observers sharing one subscription.
pub struct SignificantChangeRegistry {
    provider: Arc<dyn LocationProvider>,
    runtime: Handle,
    state: Arc<Mutex<RegistryState>>,
}

impl SignificantChangeRegistry {
    pub fn new(provider: Arc<dyn LocationProvider>, runtime: Handle) -> Self {
        Self {
            provider,
            runtime,
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// Register an observer.
    ///
    /// Starts the shared subscription if none is running. Returns false,
    /// without adding the handler, if the provider cannot start one.
    ///
    /// The provider is started without holding the registry lock, so it may
    /// call back into the registry.
    pub fn register(
        &self,
        handler: impl FnMut(&LocationEvent) -> ControlFlow<()> + Send + 'static,
    ) -> bool {
        let handler: SignificantChangeHandler = Box::new(handler);

        {
            let mut state = self.state.lock();
            if state.pump.is_some() {
                add_observer(&mut state, handler);
                return true;
            }
        }

        let subscription = match self.provider.start_significant_change_updates() {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, "Significant-change monitoring unavailable");
                return false;
            }
        };

        let mut state = self.state.lock();
        if state.pump.is_some() {
            // Another registration started one meanwhile.
            add_observer(&mut state, handler);
            drop(state);
            drop(subscription);
            return true;
        }

        state.generation += 1;
        let stop = CancellationToken::new();
        state.pump = Some(stop.clone());
        self.runtime.spawn(pump(
            Arc::clone(&self.state),
            subscription,
            state.generation,
            stop,
        ));
        info!(generation = state.generation, "Significant-change monitoring started");
        add_observer(&mut state, handler);
        true
    }

    /// Remove every observer and stop the shared subscription.
    pub fn unregister_all(&self) {
        let (stop, removed) = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.dispatching = 0;
            (state.pump.take(), std::mem::take(&mut state.observers))
        };

        if let Some(stop) = stop {
            stop.cancel();
            info!(
                observers = removed.len(),
                "Significant-change monitoring stopped"
            );
        }
    }

    /// Registered observers, including those in the round in progress.
    pub fn observer_count(&self) -> usize {
        let state = self.state.lock();
        state.observers.len() + state.dispatching
    }

    /// Returns true while a shared subscription is running.
    pub fn is_monitoring(&self) -> bool {
        self.state.lock().pump.is_some()
    }
}

impl Drop for SignificantChangeRegistry {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

impl fmt::Debug for SignificantChangeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignificantChangeRegistry")
            .field("observers", &self.observer_count())
            .field("monitoring", &self.is_monitoring())
            .finish_non_exhaustive()
    }
}

fn add_observer(state: &mut RegistryState, handler: SignificantChangeHandler) {
    state.next_observer_id += 1;
    let id = state.next_observer_id;
    state.observers.push(Observer {
        id,
        handler,
        active: true,
    });
    debug!(observer = id, "Significant-change observer registered");
}

async fn pump(
    state: Arc<Mutex<RegistryState>>,
    mut subscription: LocationSubscription,
    generation: u64,
    stop: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;

            _ = stop.cancelled() => break,
            event = subscription.next() => event,
        };

        match event {
            Some(event) => {
                if !dispatch(&state, generation, &event) {
                    break;
                }
            }
            None => {
                warn!(generation, "Significant-change stream closed by provider");
                let closed = Err(ProviderError::Failed(
                    "significant-change stream closed".to_string(),
                ));
                dispatch(&state, generation, &closed);
                retire(&state, generation);
                break;
            }
        }
    }
    subscription.stop();
    debug!(generation, "Significant-change pump exited");
}

/// Run one round. Returns false when the pump should exit.
fn dispatch(state: &Mutex<RegistryState>, generation: u64, event: &LocationEvent) -> bool {
    let mut observers = {
        let mut state = state.lock();
        if state.generation != generation {
            return false;
        }
        state.dispatching = state.observers.len();
        std::mem::take(&mut state.observers)
    };

    // Handlers may unregister everything mid-round; later ones are skipped.
    let mut unregistered = false;
    observers.retain_mut(|observer| {
        if unregistered {
            return true;
        }
        let keep = observer.notify(event);
        unregistered = state.lock().generation != generation;
        keep
    });

    let mut state = state.lock();
    if state.generation != generation {
        // Unregistered during the round.
        return false;
    }
    state.dispatching = 0;
    observers.append(&mut state.observers);
    state.observers = observers;

    if state.observers.is_empty() {
        state.pump = None;
        state.generation += 1;
        info!("Last significant-change observer left, monitoring stopped");
        return false;
    }
    true
}

/// Drop all observers of `generation` after its stream ended.
fn retire(state: &Mutex<RegistryState>, generation: u64) {
    let _removed = {
        let mut state = state.lock();
        if state.generation != generation {
            return;
        }
        state.generation += 1;
        state.pump = None;
        std::mem::take(&mut state.observers)
    };
}
