use thiserror::Error;

use super::events::TransactionEvent;
use super::states::TransactionState;

/// Internal state machine misuse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on {event:?}")]
    InvalidTransition {
        from: TransactionState,
        event: TransactionEvent,
    },

    #[error("Invalid state {state}: {reason}")]
    InvalidState {
        state: TransactionState,
        reason: String,
    },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
