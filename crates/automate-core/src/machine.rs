use crate::container::ContainerError;
use crate::storage::{StorageError, StoragePool};
use crate::tracked::{StackError, TrackedStack};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;

/// Lifecycle state an adapter reports for its machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineState {
    /// Switched off or not yet usable. Never polled for output or fed.
    Disabled,
    /// Idle and ready for input.
    Empty,
    /// Working; nothing to collect yet.
    Processing,
    /// Holding output ready for collection.
    Done,
}

impl MachineState {
    /// Numeric code for overlays: 0 none, 1 empty, 2 processing, 3 finished.
    pub fn diagnostic_code(self) -> u8 {
        match self {
            MachineState::Disabled => 0,
            MachineState::Empty => 1,
            MachineState::Processing => 2,
            MachineState::Done => 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("machine is unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error("{0}")]
    Adapter(String),
}

/// Uniform view of one automatable machine.
///
/// An adapter wraps a host object and translates between it and the engine.
/// The engine calls [`get_state`](Machine::get_state) every tick and only
/// then, depending on the state, [`get_output`](Machine::get_output) or
/// [`set_input`](Machine::set_input).
///
/// # Contract for `set_input`
///
/// Return `Ok(true)` only after taking the consumed items out of the pool.
/// Return `Ok(false)` without touching the pool. The engine verifies both
/// against the pool journal and reverts or ignores violations.
pub trait Machine: Debug {
    /// Stable type name, used for per-type configuration and logging.
    fn machine_type(&self) -> &str;

    fn get_state(&self) -> MachineState;

    /// The pending output, if any. Removing items through the returned stack
    /// runs the adapter's own completion logic.
    fn get_output(&mut self) -> Option<TrackedStack<'_>>;

    /// Try to start processing with items from `pool`.
    fn set_input(&mut self, pool: &mut StoragePool<'_>) -> Result<bool, MachineError>;

    /// Whether the machine wants input in `state`. Most machines only accept
    /// input when empty; always-accepting sinks override this.
    fn accepts_input(&self, state: MachineState) -> bool {
        state == MachineState::Empty
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_codes() {
        assert_eq!(MachineState::Disabled.diagnostic_code(), 0);
        assert_eq!(MachineState::Empty.diagnostic_code(), 1);
        assert_eq!(MachineState::Processing.diagnostic_code(), 2);
        assert_eq!(MachineState::Done.diagnostic_code(), 3);
    }

    #[test]
    fn storage_errors_convert() {
        let err: MachineError = StackError::NothingToTake(0).into();
        assert!(matches!(err, MachineError::Stack(_)));
        assert_eq!(err.to_string(), "slot 0 holds nothing to take");
    }
}
