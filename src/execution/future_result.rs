//! # Deferred Results
//!
//! [`FutureResult`] wraps a materialize function that runs at most once, plus
//! an optional cancel function. [`CommandOutput`] is what command execution
//! hands back: either a ready value or a deferred one.
//!
//! A `FutureResult` is driven through `&mut self`; sharing one between tasks
//! requires external synchronization.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;

use crate::error::{CommandError, Result};

type Materialize = Box<dyn FnOnce() -> BoxFuture<'static, Result<Value>> + Send>;
type Cancel = Box<dyn FnOnce() + Send>;

enum FutureState {
    Pending {
        materialize: Materialize,
        cancel: Option<Cancel>,
    },
    Materializing,
    Realized(Result<Value>),
    Cancelled,
}

/// Lazily materialized, cancellable command result
pub struct FutureResult {
    state: FutureState,
    label: Option<String>,
}

impl FutureResult {
    pub fn new<F, Fut>(materialize: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            state: FutureState::Pending {
                materialize: Box::new(move || materialize().boxed()),
                cancel: None,
            },
            label: None,
        }
    }

    /// Already realized value
    pub fn ready(value: Value) -> Self {
        Self {
            state: FutureState::Realized(Ok(value)),
            label: None,
        }
    }

    /// Attach the function invoked by [`cancel`](Self::cancel) before materialization
    pub fn with_cancel<C>(mut self, cancel_fn: C) -> Self
    where
        C: FnOnce() + Send + 'static,
    {
        if let FutureState::Pending { cancel, .. } = &mut self.state {
            *cancel = Some(Box::new(cancel_fn));
        }
        self
    }

    /// Name reported when a cancelled future is accessed
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Materialize on first call, then return the cached outcome
    pub async fn deref(&mut self) -> Result<Value> {
        match std::mem::replace(&mut self.state, FutureState::Materializing) {
            FutureState::Pending { materialize, .. } => {
                let outcome = materialize().await;
                self.state = FutureState::Realized(outcome.clone());
                outcome
            }
            FutureState::Realized(outcome) => {
                self.state = FutureState::Realized(outcome.clone());
                outcome
            }
            FutureState::Cancelled => {
                self.state = FutureState::Cancelled;
                Err(CommandError::cancelled(self.label.clone()))
            }
            // A previous deref was dropped before it finished
            FutureState::Materializing => {
                self.state = FutureState::Cancelled;
                Err(CommandError::cancelled(self.label.clone()))
            }
        }
    }

    /// Consume the future and materialize it
    pub async fn wait(mut self) -> Result<Value> {
        self.deref().await
    }

    /// Cancel before materialization. Returns false once realized or already cancelled.
    pub fn cancel(&mut self) -> bool {
        match std::mem::replace(&mut self.state, FutureState::Cancelled) {
            FutureState::Pending { cancel, .. } => {
                if let Some(cancel) = cancel {
                    cancel();
                }
                true
            }
            FutureState::Materializing => true,
            FutureState::Cancelled => false,
            realized @ FutureState::Realized(_) => {
                self.state = realized;
                false
            }
        }
    }

    pub fn is_realized(&self) -> bool {
        matches!(self.state, FutureState::Realized(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, FutureState::Cancelled)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, FutureState::Pending { .. })
    }
}

impl fmt::Debug for FutureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            FutureState::Pending { .. } => "pending",
            FutureState::Materializing => "materializing",
            FutureState::Realized(Ok(_)) => "realized",
            FutureState::Realized(Err(_)) => "failed",
            FutureState::Cancelled => "cancelled",
        };
        f.debug_struct("FutureResult")
            .field("state", &state)
            .field("label", &self.label)
            .finish()
    }
}

/// Result of executing a command
#[derive(Debug)]
pub enum CommandOutput {
    Ready(Value),
    Deferred(FutureResult),
}

impl CommandOutput {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    /// The final value, forcing a deferred output
    pub async fn into_value(self) -> Result<Value> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Deferred(future) => future.wait().await,
        }
    }

    pub fn into_future(self) -> Option<FutureResult> {
        match self {
            Self::Deferred(future) => Some(future),
            Self::Ready(_) => None,
        }
    }
}

impl From<Value> for CommandOutput {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl From<FutureResult> for CommandOutput {
    fn from(future: FutureResult) -> Self {
        Self::Deferred(future)
    }
}
