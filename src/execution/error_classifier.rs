//! # Command Error Classification
//!
//! Turns raw failures observed during a transaction into typed
//! [`CommandError`]s.
//!
//! ## Overview
//!
//! Failures reach the lifecycle engine from two directions: the transport
//! reports a [`TransportFailure`] (possibly carrying the response that caused
//! it), and hooks return arbitrary `anyhow` errors. The classifier maps both
//! onto the typed hierarchy:
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌────────────────────────┐
//! │ Failure          │────▶│ ErrorClassifier │────▶│ CommandError           │
//! │ + transaction    │     │ Strategy        │     │ Client/Server/Command  │
//! └──────────────────┘     └─────────────────┘     └────────────────────────┘
//! ```
//!
//! | Response status | Kind                  |
//! |-----------------|-----------------------|
//! | `400..=499`     | [`ErrorKind::Client`] |
//! | `500..=599`     | [`ErrorKind::Server`] |
//! | other or none   | [`ErrorKind::Command`]|
//!
//! Classification is idempotent: a failure that already is a `CommandError`
//! (directly, or wrapped in an `anyhow::Error`) comes back unchanged.
//!
//! ## Usage
//!
//! ```rust
//! use command_core::error::ErrorKind;
//! use command_core::execution::error_classifier::StandardErrorClassifier;
//!
//! assert_eq!(StandardErrorClassifier::kind_for_status(Some(404)), ErrorKind::Client);
//! assert_eq!(StandardErrorClassifier::kind_for_status(Some(503)), ErrorKind::Server);
//! assert_eq!(StandardErrorClassifier::kind_for_status(None), ErrorKind::Command);
//! ```

use std::sync::Arc;

use crate::error::{Cause, CommandError, ErrorDetails, ErrorKind};
use crate::execution::transport::TransportFailure;
use crate::state_machine::transaction::CommandTransaction;

/// A failure waiting to be classified
#[derive(Debug)]
pub enum Failure {
    /// Reported by the transport for the current attempt
    Transport(TransportFailure),
    /// Returned by a hook
    Hook(anyhow::Error),
    /// Already typed
    Command(CommandError),
    /// The transport task ended without reporting an outcome
    Disconnected,
}

impl From<TransportFailure> for Failure {
    fn from(failure: TransportFailure) -> Self {
        Self::Transport(failure)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self::Hook(error)
    }
}

impl From<CommandError> for Failure {
    fn from(error: CommandError) -> Self {
        Self::Command(error)
    }
}

/// Strategy for turning failures into typed command errors
pub trait ErrorClassifier: Send + Sync {
    /// Classify a failure raised while `transaction` was executing
    fn classify(&self, failure: Failure, transaction: &CommandTransaction) -> CommandError;

    /// Name reported in logs
    fn classifier_name(&self) -> &'static str {
        "custom"
    }
}

/// Status-range classifier used by default
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn kind_for_status(status: Option<u16>) -> ErrorKind {
        match status {
            Some(400..=499) => ErrorKind::Client,
            Some(500..=599) => ErrorKind::Server,
            _ => ErrorKind::Command,
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, failure: Failure, transaction: &CommandTransaction) -> CommandError {
        match failure {
            Failure::Command(error) => error,
            Failure::Hook(error) => match error.downcast::<CommandError>() {
                Ok(error) => error,
                Err(error) => {
                    let message = error.to_string();
                    let cause: Box<dyn std::error::Error + Send + Sync> = error.into();
                    let details = ErrorDetails::from_transaction(transaction, message)
                        .with_cause(Cause::from(cause));
                    let kind =
                        Self::kind_for_status(transaction.response().map(|r| r.status()));
                    CommandError::new(kind, details)
                }
            },
            Failure::Transport(failure) => {
                let response = failure.response().cloned();
                let kind = Self::kind_for_status(response.as_ref().map(|r| r.status()));
                let details = ErrorDetails::from_transaction(transaction, failure.message())
                    .with_response(response)
                    .with_cause(Arc::new(failure));
                CommandError::new(kind, details)
            }
            Failure::Disconnected => CommandError::new(
                ErrorKind::Command,
                ErrorDetails::from_transaction(
                    transaction,
                    "The transport finished without reporting a response or failure",
                ),
            ),
        }
    }

    fn classifier_name(&self) -> &'static str {
        "standard"
    }
}
