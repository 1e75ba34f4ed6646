//! Cross-thread handle to an operation.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::state::{OperationState, StateCell};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique operation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// State shared between an operation's execution context and its handles.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) id: OperationId,
    pub(crate) name: &'static str,
    pub(crate) state: StateCell,
    pub(crate) cancel: CancellationToken,
    delivered: AtomicBool,
    done: Notify,
}

impl Shared {
    pub(crate) fn new(name: &'static str, cancel: CancellationToken) -> Self {
        Self {
            id: OperationId::next(),
            name,
            state: StateCell::new(),
            cancel,
            delivered: AtomicBool::new(false),
            done: Notify::new(),
        }
    }

    /// Called by the execution context once the completion handler returned.
    pub(crate) fn mark_delivered(&self) {
        self.delivered.store(true, Ordering::Release);
        self.done.notify_waiters();
    }
}

/// Handle for observing and cancelling an operation from any thread.
///
/// Cloning is cheap; all clones refer to the same operation.
#[derive(Clone)]
pub struct OperationHandle {
    shared: Arc<Shared>,
}

impl OperationHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Operation identifier.
    pub fn id(&self) -> OperationId {
        self.shared.id
    }

    /// Short name of the operation kind.
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OperationState {
        self.shared.state.load()
    }

    /// Returns true if `cancel()` has been called (or the owning dispatcher
    /// shut down), whatever the state.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Request cancellation. Never blocks, callable any number of times.
    ///
    /// The unwind happens asynchronously on the execution context; observe
    /// the result through the completion handler. After `Finished` this only
    /// records the flag.
    pub fn cancel(&self) {
        if !self.shared.cancel.is_cancelled() {
            debug!(
                operation = %self.shared.id,
                kind = self.shared.name,
                state = %self.state(),
                "Cancellation requested"
            );
        }
        self.shared.cancel.cancel();
    }

    /// Wait until the operation is finished and its completion handler has
    /// returned.
    pub async fn finished(&self) {
        let notified = self.shared.done.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.shared.delivered.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }
}

impl fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
