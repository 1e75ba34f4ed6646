//! Operation state and its lock-free cell.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum OperationState {
    /// Created, not yet running on its execution context.
    Inited = 0,
    /// Running its start-of-work hook.
    Executing = 1,
    /// Done. The public state never changes again.
    Finished = 2,
}

impl OperationState {
    /// Returns true if the operation is finished.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Inited,
            1 => Self::Executing,
            _ => Self::Finished,
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inited => "inited",
            Self::Executing => "executing",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// State cell written by the execution context, readable from any thread.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(OperationState::Inited as u8))
    }

    pub(crate) fn load(&self) -> OperationState {
        OperationState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move forward to `next`.
    ///
    /// # Panics
    ///
    /// Panics on a backward or repeated transition.
    pub(crate) fn advance(&self, next: OperationState) {
        let previous = OperationState::from_u8(self.0.swap(next as u8, Ordering::AcqRel));
        assert!(
            previous < next,
            "illegal operation transition {} -> {}",
            previous,
            next
        );
    }
}
