//! Cancellable asynchronous operation lifecycle.
//!
//! An [`Operation`] is a one-shot unit of asynchronous work with three
//! states, `Inited -> Executing -> Finished`. Kind-specific behaviour is
//! supplied through [`OperationHooks`]; the lifecycle itself is shared.
//!
//! # Execution Context
//!
//! Every operation runs on exactly one dedicated execution context: a tokio
//! task spawned by `start()` (or by the dispatcher). All state transitions,
//! hook invocations and collaborator calls happen on that task, so the
//! operation needs no lock for its own state. The only field written from
//! outside is the cancellation flag, a `CancellationToken`.
//!
//! # Cancellation Races
//!
//! ```text
//! cancel before the context runs   -> Inited -> Finished(Cancelled), start hook skipped
//! cancel while Executing           -> cancel hook, then Finished(Cancelled)
//! cancel racing a finishing hook   -> whichever the context observes first wins
//! cancel after Finished            -> flag recorded, nothing else changes
//! ```
//!
//! The completion handler runs exactly once, after the state is `Finished`.
//! Finishing twice is an invariant breach and panics.

mod handle;
mod lifecycle;
mod state;

pub use handle::{OperationHandle, OperationId};
pub use lifecycle::{CompletionHandler, Operation, OperationHooks};
pub use state::OperationState;
