//! The operation state machine and its hook table.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::handle::{OperationHandle, Shared};
use super::state::OperationState;
use crate::error::LocationError;

/// One-shot completion callback.
pub type CompletionHandler<T> = Box<dyn FnOnce(T) + Send>;

/// Kind-specific behaviour plugged into the shared lifecycle.
///
/// Every method runs on the operation's execution context.
pub trait OperationHooks: Send + 'static {
    /// Payload handed to the completion handler.
    type Output: Send + 'static;

    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Start-of-work hook.
    ///
    /// The returned future drives the work; resolving it finishes the
    /// operation with its error (`Ok(())` is success). A future that is
    /// immediately ready finishes the operation straight away. Not invoked
    /// if cancellation was observed before the operation began executing.
    fn operation_did_start(&mut self) -> BoxFuture<'_, Result<(), LocationError>>;

    /// Cancellation hook, invoked when cancellation interrupts a running
    /// start hook. Must stop any external call in progress.
    fn operation_was_cancelled(&mut self) {}

    /// Finish hook. Always invoked exactly once before completion delivery,
    /// including on cancellation; release collaborator resources here.
    fn operation_will_finish(&mut self, _error: Option<&LocationError>) {}

    /// Build the completion payload.
    fn into_output(self, error: Option<LocationError>) -> Self::Output;
}

/// A cancellable one-shot operation.
///
/// Created `Inited`. `start()` hands the work to a dedicated execution
/// context; it may be called from any thread but only the first call has an
/// effect.
pub struct Operation<H: OperationHooks> {
    shared: Arc<Shared>,
    runner: Mutex<Option<Runner<H>>>,
}

impl<H: OperationHooks> Operation<H> {
    /// Create an operation with its own cancellation flag.
    pub fn new(hooks: H, on_complete: impl FnOnce(H::Output) + Send + 'static) -> Self {
        Self::with_cancellation(hooks, CancellationToken::new(), on_complete)
    }

    /// Create an operation whose cancellation flag is `cancel`.
    ///
    /// Passing a child token lets an owner cancel many operations at once.
    pub fn with_cancellation(
        hooks: H,
        cancel: CancellationToken,
        on_complete: impl FnOnce(H::Output) + Send + 'static,
    ) -> Self {
        let shared = Arc::new(Shared::new(hooks.name(), cancel));
        let runner = Runner {
            shared: Arc::clone(&shared),
            hooks,
            on_complete: Some(Box::new(on_complete)),
        };
        Self {
            shared,
            runner: Mutex::new(Some(runner)),
        }
    }

    /// Handle for observing and cancelling this operation.
    pub fn handle(&self) -> OperationHandle {
        OperationHandle::new(Arc::clone(&self.shared))
    }

    /// Current state.
    pub fn state(&self) -> OperationState {
        self.shared.state.load()
    }

    /// Request cancellation. See [`OperationHandle::cancel`].
    pub fn cancel(&self) {
        self.handle().cancel();
    }

    /// Start the operation on a freshly spawned execution context.
    ///
    /// Returns false (and does nothing) if it was already started. Work is
    /// always deferred to the execution context, even when cancellation has
    /// already been requested.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self) -> bool {
        match self.take_runner() {
            Some(runner) => {
                tokio::spawn(runner.run());
                true
            }
            None => false,
        }
    }

    /// Claim the runner so a caller can place the execution context itself.
    pub(crate) fn take_runner(&self) -> Option<Runner<H>> {
        let runner = self.runner.lock().take();
        if runner.is_none() {
            debug!(
                operation = %self.shared.id,
                kind = self.shared.name,
                "Start ignored: operation already started"
            );
        }
        runner
    }
}

impl<H: OperationHooks> fmt::Debug for Operation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The execution-context half of an operation.
pub(crate) struct Runner<H: OperationHooks> {
    shared: Arc<Shared>,
    hooks: H,
    on_complete: Option<CompletionHandler<H::Output>>,
}

impl<H: OperationHooks> Runner<H> {
    /// The operation's cancellation flag.
    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Run the operation to completion on the current task.
    pub(crate) async fn run(mut self) {
        let shared = Arc::clone(&self.shared);

        if shared.cancel.is_cancelled() {
            debug!(
                operation = %shared.id,
                kind = shared.name,
                "Cancelled before start"
            );
            self.finish(Some(LocationError::Cancelled));
            return;
        }

        shared.state.advance(OperationState::Executing);
        debug!(operation = %shared.id, kind = shared.name, "Operation executing");

        let outcome = {
            let work = AssertUnwindSafe(self.hooks.operation_did_start()).catch_unwind();
            tokio::select! {
                biased;

                _ = shared.cancel.cancelled() => None,
                result = work => Some(result),
            }
        };

        let error = match outcome {
            Some(Ok(result)) => result.err(),
            Some(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                error!(
                    operation = %shared.id,
                    kind = shared.name,
                    panic = %message,
                    "Start-of-work hook panicked"
                );
                Some(LocationError::Aborted(message))
            }
            None => {
                debug!(operation = %shared.id, kind = shared.name, "Cancelled while executing");
                self.hooks.operation_was_cancelled();
                Some(LocationError::Cancelled)
            }
        };
        self.finish(error);
    }

    /// Transition to `Finished` and deliver the completion payload.
    fn finish(self, error: Option<LocationError>) {
        let Runner {
            shared,
            mut hooks,
            on_complete,
        } = self;

        hooks.operation_will_finish(error.as_ref());
        shared.state.advance(OperationState::Finished);

        debug!(
            operation = %shared.id,
            kind = shared.name,
            error = ?error.as_ref().map(|e| e.kind()),
            "Operation finished"
        );

        let output = hooks.into_output(error);
        if let Some(handler) = on_complete {
            if panic::catch_unwind(AssertUnwindSafe(move || handler(output))).is_err() {
                error!(
                    operation = %shared.id,
                    kind = shared.name,
                    "Completion handler panicked"
                );
            }
        }
        shared.mark_delivered();
    }
}
