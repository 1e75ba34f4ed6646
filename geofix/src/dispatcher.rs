//! Request dispatcher: runs operations on their own execution contexts.
//!
//! Every submitted operation gets a dedicated tokio task. The caller never
//! blocks: an optional concurrency limit is enforced by a semaphore acquired
//! *inside* the spawned task, so queued operations wait there rather than in
//! `submit`.
//!
//! ```text
//! submit(op) ──► spawn ──► [permit | cancelled] ──► Runner::run ──► completion
//!      │                                                  ▲
//!      └── returns immediately                  shutdown token (parent)
//! ```
//!
//! The dispatcher owns a shutdown token. Operations built with
//! [`RequestDispatcher::child_token`] are cancelled together by
//! [`RequestDispatcher::shutdown`].

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::operation::{Operation, OperationHooks};

/// Decrements the in-flight counter when the execution context ends.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn new(in_flight: Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Concurrent executor for operations.
pub struct RequestDispatcher {
    runtime: Handle,
    limiter: Option<Arc<Semaphore>>,
    limit: Option<usize>,
    in_flight: Arc<AtomicUsize>,
    submitted: AtomicU64,
    shutdown: CancellationToken,
}

impl RequestDispatcher {
    /// Create a dispatcher on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoRuntime`] when called outside a runtime.
    pub fn new(config: &ManagerConfig) -> Result<Self, ManagerError> {
        let runtime = Handle::try_current().map_err(|e| ManagerError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(runtime, config.max_concurrent_requests))
    }

    /// Create a dispatcher spawning onto `runtime`.
    ///
    /// `limit` caps how many operations execute at once; `None` is unbounded.
    /// A limit of zero is treated as one; limits above
    /// [`Semaphore::MAX_PERMITS`] are capped there.
    pub fn with_handle(runtime: Handle, limit: Option<usize>) -> Self {
        let limit = limit.map(|n| n.clamp(1, Semaphore::MAX_PERMITS));
        Self {
            runtime,
            limiter: limit.map(|n| Arc::new(Semaphore::new(n))),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
            submitted: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Run `operation` on a new execution context.
    ///
    /// Returns false if the operation was already started (by `start()` or a
    /// previous submission); nothing is spawned in that case.
    pub fn submit<H: OperationHooks>(&self, operation: &Operation<H>) -> bool {
        let Some(runner) = operation.take_runner() else {
            return false;
        };

        let guard = InFlightGuard::new(Arc::clone(&self.in_flight));
        let limiter = self.limiter.clone();
        let cancel = runner.cancellation();
        let submitted = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;

        debug!(
            request_id = %operation.handle().id(),
            kind = operation.handle().name(),
            submitted,
            "Dispatching operation"
        );

        self.runtime.spawn(async move {
            let _guard = guard;
            // A cancelled operation skips the queue; the runner finishes it
            // without running the start hook.
            let _permit = match limiter {
                Some(semaphore) => tokio::select! {
                    biased;

                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                },
                None => None,
            };
            runner.run().await;
        });
        true
    }

    /// A fresh child of the shutdown token, for a new operation.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// The shutdown token itself.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel every operation whose token derives from this dispatcher.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(in_flight = self.in_flight(), "Request dispatcher shutting down");
            self.shutdown.cancel();
        }
    }

    /// Returns true once `shutdown()` was called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Operations submitted but not yet done (queued or executing).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Total operations submitted.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Configured concurrency limit.
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.limit
    }
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("limit", &self.limit)
            .field("in_flight", &self.in_flight())
            .field("submitted", &self.submitted())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocationError;
    use crate::operation::OperationState;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Sleeps, tracking how many sleepers run at once.
    struct Sleeper {
        duration: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl OperationHooks for Sleeper {
        type Output = Option<LocationError>;

        fn name(&self) -> &'static str {
            "sleeper"
        }

        fn operation_did_start(&mut self) -> BoxFuture<'_, Result<(), LocationError>> {
            async move {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.duration).await;
                self.running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }

        fn into_output(self, error: Option<LocationError>) -> Self::Output {
            error
        }
    }

    struct Fixture {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn sleeper(
            &self,
            dispatcher: &RequestDispatcher,
            duration: Duration,
        ) -> (Operation<Sleeper>, oneshot::Receiver<Option<LocationError>>) {
            let (tx, rx) = oneshot::channel();
            let hooks = Sleeper {
                duration,
                running: Arc::clone(&self.running),
                peak: Arc::clone(&self.peak),
            };
            let op = Operation::with_cancellation(hooks, dispatcher.child_token(), move |e| {
                let _ = tx.send(e);
            });
            (op, rx)
        }
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = RequestDispatcher::new(&ManagerConfig::default());
        assert!(matches!(result, Err(ManagerError::NoRuntime(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_runs_operation() {
        let dispatcher = RequestDispatcher::new(&ManagerConfig::default()).unwrap();
        let fixture = Fixture::new();
        let (op, rx) = fixture.sleeper(&dispatcher, Duration::from_millis(10));

        assert!(dispatcher.submit(&op));
        assert_eq!(dispatcher.in_flight(), 1);
        assert_eq!(rx.await.unwrap(), None);

        op.handle().finished().await;
        assert_eq!(op.state(), OperationState::Finished);
        assert_eq!(dispatcher.submitted(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_started_operation() {
        let dispatcher = RequestDispatcher::new(&ManagerConfig::default()).unwrap();
        let fixture = Fixture::new();
        let (op, _rx) = fixture.sleeper(&dispatcher, Duration::ZERO);

        assert!(op.start());
        assert!(!dispatcher.submit(&op));
        assert_eq!(dispatcher.submitted(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_runs_everything_at_once() {
        let dispatcher = RequestDispatcher::new(&ManagerConfig::default()).unwrap();
        let fixture = Fixture::new();
        let ops: Vec<_> = (0..4)
            .map(|_| fixture.sleeper(&dispatcher, Duration::from_secs(1)))
            .collect();

        for (op, _) in &ops {
            dispatcher.submit(op);
        }
        for (_, rx) in ops {
            rx.await.unwrap();
        }
        assert_eq!(fixture.peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_limit_is_clamped_to_semaphore_range() {
        let dispatcher = RequestDispatcher::with_handle(Handle::current(), Some(usize::MAX));
        assert_eq!(dispatcher.concurrency_limit(), Some(Semaphore::MAX_PERMITS));

        let fixture = Fixture::new();
        let (op, rx) = fixture.sleeper(&dispatcher, Duration::ZERO);
        assert!(dispatcher.submit(&op));
        assert_eq!(rx.await.unwrap(), None);

        let dispatcher = RequestDispatcher::with_handle(Handle::current(), Some(0));
        assert_eq!(dispatcher.concurrency_limit(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_is_respected() {
        let dispatcher = RequestDispatcher::with_handle(Handle::current(), Some(2));
        let fixture = Fixture::new();
        let ops: Vec<_> = (0..5)
            .map(|_| fixture.sleeper(&dispatcher, Duration::from_secs(1)))
            .collect();

        for (op, _) in &ops {
            assert!(dispatcher.submit(op));
        }
        assert_eq!(dispatcher.in_flight(), 5);

        for (_, rx) in ops {
            assert_eq!(rx.await.unwrap(), None);
        }
        assert_eq!(fixture.peak.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.concurrency_limit(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_operation_skips_queue() {
        let dispatcher = RequestDispatcher::with_handle(Handle::current(), Some(1));
        let fixture = Fixture::new();
        let (blocker, blocker_rx) = fixture.sleeper(&dispatcher, Duration::from_secs(60));
        let (queued, queued_rx) = fixture.sleeper(&dispatcher, Duration::from_secs(1));

        dispatcher.submit(&blocker);
        dispatcher.submit(&queued);
        queued.cancel();

        assert_eq!(queued_rx.await.unwrap(), Some(LocationError::Cancelled));
        assert_eq!(blocker.state(), OperationState::Executing);

        blocker.cancel();
        assert_eq!(blocker_rx.await.unwrap(), Some(LocationError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_in_flight() {
        let dispatcher = RequestDispatcher::new(&ManagerConfig::default()).unwrap();
        let fixture = Fixture::new();
        let (a, a_rx) = fixture.sleeper(&dispatcher, Duration::from_secs(60));
        let (b, b_rx) = fixture.sleeper(&dispatcher, Duration::from_secs(60));
        dispatcher.submit(&a);
        dispatcher.submit(&b);

        dispatcher.shutdown();
        assert!(dispatcher.is_shut_down());

        assert_eq!(a_rx.await.unwrap(), Some(LocationError::Cancelled));
        assert_eq!(b_rx.await.unwrap(), Some(LocationError::Cancelled));
        a.handle().finished().await;
        b.handle().finished().await;
    }
}
