//! Queue of canned results consumed by prepare, so no request is ever built.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::constants::priority;
use crate::error::{CommandError, ErrorDetails, ErrorKind};
use crate::state_machine::hooks::{HookOutcome, HookRegistry, Phase, Subscriber};

/// One queued outcome
#[derive(Debug, Clone)]
pub enum MockResult {
    /// Returned as the command result
    Value(Value),
    /// Raised as-is
    Error(CommandError),
    /// Raised as a base command error with this message
    Message(String),
}

impl From<Value> for MockResult {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<CommandError> for MockResult {
    fn from(error: CommandError) -> Self {
        Self::Error(error)
    }
}

/// Intercepts prepare with queued results in FIFO order
///
/// Clones share the queue, so results can be added after subscribing.
#[derive(Debug, Clone, Default)]
pub struct ResultMock {
    queue: Arc<Mutex<VecDeque<MockResult>>>,
}

impl ResultMock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: impl IntoIterator<Item = MockResult>) -> Self {
        let mock = Self::new();
        mock.add_multiple(results);
        mock
    }

    pub fn add_result(&self, value: Value) -> &Self {
        self.queue.lock().push_back(MockResult::Value(value));
        self
    }

    pub fn add_error(&self, error: CommandError) -> &Self {
        self.queue.lock().push_back(MockResult::Error(error));
        self
    }

    pub fn add_error_message(&self, message: impl Into<String>) -> &Self {
        self.queue.lock().push_back(MockResult::Message(message.into()));
        self
    }

    pub fn add_multiple(&self, results: impl IntoIterator<Item = MockResult>) -> &Self {
        self.queue.lock().extend(results);
        self
    }

    pub fn clear_queue(&self) {
        self.queue.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Subscriber for ResultMock {
    fn register(&self, hooks: &mut HookRegistry) {
        let queue = self.queue.clone();
        hooks.on(Phase::Prepare, priority::FIRST, move |transaction| {
            let next = queue.lock().pop_front();
            match next {
                None => HookOutcome::fail(anyhow::anyhow!("Result mock queue is empty")),
                Some(MockResult::Value(value)) => HookOutcome::intercept(value),
                Some(MockResult::Error(error)) => HookOutcome::fail(error),
                Some(MockResult::Message(message)) => HookOutcome::fail(CommandError::new(
                    ErrorKind::Command,
                    ErrorDetails::from_transaction(transaction, message),
                )),
            }
        });
    }
}
