//! # Batch Executor
//!
//! Runs many commands through the lifecycle engine with at most `pool_size`
//! attempts in flight. A permit is acquired before a command's task is
//! spawned, so PREPARE for new commands waits until a slot frees. Every
//! command gets a trailing `LAST` error hook that captures its error and
//! intercepts, so no individual failure escapes the batch.

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::client::ServiceClient;
use crate::constants::priority;
use crate::error::{CommandError, ErrorDetails, ErrorKind};
use crate::execution::command::{Command, CommandId};
use crate::logging::{log_batch_operation, log_error};
use crate::state_machine::hooks::{HookOutcome, Phase};

pub type FulfilledCallback = Arc<dyn Fn(&CommandId, &Value) + Send + Sync>;
pub type RejectedCallback = Arc<dyn Fn(&CommandId, &CommandError) + Send + Sync>;

/// Outcome of one command in a batch
pub type Outcome = Result<Value, CommandError>;

/// Options for [`BatchExecutor::execute_all`]
#[derive(Clone, Default)]
pub struct BatchOptions {
    pool_size: Option<usize>,
    on_fulfilled: Option<FulfilledCallback>,
    on_rejected: Option<RejectedCallback>,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the client's configured pool size
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn on_fulfilled<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CommandId, &Value) + Send + Sync + 'static,
    {
        self.on_fulfilled = Some(Arc::new(callback));
        self
    }

    pub fn on_rejected<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CommandId, &CommandError) + Send + Sync + 'static,
    {
        self.on_rejected = Some(Arc::new(callback));
        self
    }

    fn notify(&self, id: &CommandId, outcome: &Outcome) {
        match outcome {
            Ok(value) => {
                if let Some(callback) = &self.on_fulfilled {
                    callback(id, value);
                }
            }
            Err(error) => {
                if let Some(callback) = &self.on_rejected {
                    callback(id, error);
                }
            }
        }
    }
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("pool_size", &self.pool_size)
            .field("on_fulfilled", &self.on_fulfilled.is_some())
            .field("on_rejected", &self.on_rejected.is_some())
            .finish()
    }
}

/// Outcome map keyed by command identity, iterated in submission order
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    order: Vec<CommandId>,
    outcomes: HashMap<CommandId, Outcome>,
}

impl BatchResults {
    pub fn get(&self, id: &CommandId) -> Option<&Outcome> {
        self.outcomes.get(id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CommandId, &Outcome)> {
        self.order
            .iter()
            .filter_map(|id| self.outcomes.get(id).map(|outcome| (id, outcome)))
    }

    pub fn successes(&self) -> impl Iterator<Item = (&CommandId, &Value)> {
        self.iter()
            .filter_map(|(id, outcome)| outcome.as_ref().ok().map(|value| (id, value)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&CommandId, &CommandError)> {
        self.iter()
            .filter_map(|(id, outcome)| outcome.as_ref().err().map(|error| (id, error)))
    }

    pub fn fulfilled_count(&self) -> usize {
        self.successes().count()
    }

    pub fn rejected_count(&self) -> usize {
        self.failures().count()
    }
}

/// Bounded-concurrency executor over one client
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    client: ServiceClient,
}

impl BatchExecutor {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// Execute every command; failures are collected, never raised
    #[instrument(skip_all, fields(count = commands.len()))]
    pub async fn execute_all(&self, commands: Vec<Command>, options: BatchOptions) -> BatchResults {
        let started = Instant::now();
        let pool_size = options
            .pool_size
            .unwrap_or(self.client.config().pool_size)
            .max(1);
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let outcomes: Arc<DashMap<CommandId, Outcome>> = Arc::new(DashMap::new());
        let engine = self.client.engine();

        let mut order = Vec::with_capacity(commands.len());
        let mut pending = Vec::with_capacity(commands.len());

        for mut command in commands {
            let id = command.id();
            order.push(id);

            let captured: Arc<Mutex<Option<CommandError>>> = Arc::new(Mutex::new(None));
            let sink = captured.clone();
            command.on(Phase::Error, priority::LAST, move |transaction| {
                if let Some(error) = transaction.error() {
                    *sink.lock() = Some(error.clone());
                }
                HookOutcome::intercept(Value::Null)
            });
            let command = Arc::new(command);

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let outcome = Err(self.batch_error(&command, format!("Failed to acquire batch permit: {e}")));
                    options.notify(&id, &outcome);
                    outcomes.insert(id, outcome);
                    continue;
                }
            };

            let engine = engine.clone();
            let options = options.clone();
            let outcomes = outcomes.clone();
            let task_command = command.clone();
            let handle = tokio::spawn(async move {
                let outcome = match engine.execute_inline(task_command).await {
                    Ok(output) => output.into_value().await,
                    Err(error) => Err(error),
                };
                drop(permit); // Release the slot before notifying
                let captured_error = captured.lock().take();
                let outcome = match captured_error {
                    Some(error) => Err(error),
                    None => outcome,
                };
                options.notify(&id, &outcome);
                outcomes.insert(id, outcome);
            });
            pending.push((id, command, handle));
        }

        let (tasks, handles): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .map(|(id, command, handle)| ((id, command), handle))
            .unzip();
        let results = join_all(handles).await;

        // Panicked tasks never recorded an outcome
        for ((id, command), result) in tasks.into_iter().zip(results) {
            if let Err(e) = result {
                log_error(
                    "batch_executor",
                    "execute_all",
                    &e.to_string(),
                    Some(&format!("command_id={id}")),
                );
                let outcome = Err(self.batch_error(&command, format!("Batch command task failed: {e}")));
                options.notify(&id, &outcome);
                outcomes.insert(id, outcome);
            }
        }

        let outcomes: HashMap<CommandId, Outcome> = match Arc::try_unwrap(outcomes) {
            Ok(map) => map.into_iter().collect(),
            Err(shared) => shared
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect(),
        };
        let results = BatchResults { order, outcomes };

        log_batch_operation(
            "execute_all",
            results.len(),
            results.fulfilled_count(),
            results.rejected_count(),
            Some(started.elapsed().as_millis() as u64),
        );
        results
    }

    fn batch_error(&self, command: &Arc<Command>, message: String) -> CommandError {
        CommandError::new(
            ErrorKind::Command,
            ErrorDetails::for_command(self.client.clone(), command.clone(), message),
        )
    }
}
