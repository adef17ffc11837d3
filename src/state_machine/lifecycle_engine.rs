//! # Lifecycle Engine
//!
//! Drives a [`CommandTransaction`] through its states:
//!
//! ```text
//!             ┌───────────── retry ─────────────┐
//!             ▼                                 │
//!         ┌─────────┐ prepared ┌──────┐ failed ┌───────┐ unhandled ┌─────┐ finished ┌──────┐
//!         │ PREPARE │─────────▶│ SENT │───────▶│ ERROR │──────────▶│ END │─────────▶│ EXIT │
//!         └─────────┘          └──────┘        └───────┘  rescued  └─────┘          └──────┘
//!             │ intercepted       │ completed     ▲                   ▲
//!             ▼                   ▼               │ failed            │ processed
//!         ┌────────────────────────────┐──────────┘                   │
//!         │          PROCESS           │──────────────────────────────┘
//!         └────────────────────────────┘
//! ```
//!
//! Hook chains run synchronously. The only suspension point is SENT, where the
//! engine waits on the [`EventBridge`](crate::events::bridge::EventBridge)
//! one-shot for the transport's completion. Each attempt produces exactly one
//! of PROCESS or ERROR. A command flagged as a future returns from SENT with a
//! [`FutureResult`] that resumes the transaction when forced.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::errors::{StateMachineError, StateMachineResult};
use super::events::TransactionEvent;
use super::hooks::{Hook, HookOutcome, Phase};
use super::states::TransactionState;
use super::transaction::CommandTransaction;
use crate::client::ServiceClient;
use crate::error::{CommandError, ErrorDetails, ErrorKind, Result};
use crate::events::bridge::{Completion, InFlight};
use crate::events::publisher::LifecycleEvent;
use crate::execution::command::Command;
use crate::execution::error_classifier::Failure;
use crate::execution::future_result::{CommandOutput, FutureResult};
use crate::logging::log_command_operation;

const MISSING_REQUEST: &str = "No request was prepared for the command and no result was added \
    to intercept the event. One of the listeners must set a request in the prepare event.";

/// Whether SENT may hand back a deferred result for future commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    AllowDeferred,
    Inline,
}

/// Target state for an event, or an error for an invalid transition
pub fn determine_target_state(
    current_state: TransactionState,
    event: TransactionEvent,
) -> StateMachineResult<TransactionState> {
    use TransactionEvent as E;
    use TransactionState as S;

    let target = match (current_state, event) {
        // Prepare outcomes
        (S::Prepare, E::Prepared) => S::Sent,
        (S::Prepare, E::Intercepted) => S::Process,
        (S::Prepare, E::Aborted) => S::Exit,

        // Transport completion
        (S::Sent, E::Completed) => S::Process,
        (S::Sent, E::Failed) => S::Error,

        (S::Process, E::Processed) => S::End,
        (S::Process, E::Failed) => S::Error,
        (S::Process, E::Unhandled) => S::End,

        (S::Error, E::Rescued) => S::End,
        (S::Error, E::Unhandled) => S::End,

        // Retry from either outcome
        (S::Process, E::Retry) => S::Prepare,
        (S::Error, E::Retry) => S::Prepare,

        (S::End, E::Finished) => S::Exit,

        // Deferred result forced
        (S::Exit, E::Resumed) => S::Process,

        (from, event) => return Err(StateMachineError::InvalidTransition { from, event }),
    };

    Ok(target)
}

/// Executes commands for one client
#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    client: ServiceClient,
}

impl LifecycleEngine {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Execute a command; future commands return a deferred output from SENT
    #[instrument(skip_all, fields(command = %command.name(), command_id = %command.id()))]
    pub async fn execute(&self, command: Arc<Command>) -> Result<CommandOutput> {
        self.start(command, ExecutionMode::AllowDeferred).await
    }

    /// Execute a command, waiting on the transport even when it is flagged as a future
    #[instrument(skip_all, fields(command = %command.name(), command_id = %command.id()))]
    pub async fn execute_inline(&self, command: Arc<Command>) -> Result<CommandOutput> {
        self.start(command, ExecutionMode::Inline).await
    }

    async fn start(&self, command: Arc<Command>, mode: ExecutionMode) -> Result<CommandOutput> {
        info!(future = command.is_future(), ?mode, "executing command");
        let name = command.name().to_string();
        let id = command.id().to_string();
        let transaction = CommandTransaction::new(self.client.clone(), command);
        let outcome = self.run(transaction, mode).await;
        match &outcome {
            Ok(output) => {
                let status = if output.is_deferred() { "deferred" } else { "completed" };
                log_command_operation("execute", &name, Some(&id), status, None);
            }
            Err(error) => {
                let status = format!("{}_error", error.kind());
                let details = error.to_string();
                log_command_operation("execute", &name, Some(&id), &status, Some(&details));
            }
        }
        outcome
    }

    fn run(
        &self,
        mut transaction: CommandTransaction,
        mode: ExecutionMode,
    ) -> BoxFuture<'static, Result<CommandOutput>> {
        let engine = self.clone();
        async move {
            loop {
                let event = match transaction.state() {
                    TransactionState::Prepare => engine.prepare(&mut transaction),
                    TransactionState::Sent => {
                        let in_flight = match engine.submit(&transaction) {
                            Ok(in_flight) => in_flight,
                            Err(error) => {
                                transaction.set_error(error);
                                engine.transition(&mut transaction, TransactionEvent::Failed)?;
                                continue;
                            }
                        };
                        if mode == ExecutionMode::AllowDeferred && transaction.command().is_future() {
                            let future = engine.defer(transaction, in_flight);
                            return Ok(CommandOutput::Deferred(future));
                        }
                        let completion = in_flight.wait().await;
                        engine.complete(&mut transaction, completion)
                    }
                    TransactionState::Process => engine.process(&mut transaction),
                    TransactionState::Error => engine.handle_error(&mut transaction),
                    TransactionState::End => engine.end(&mut transaction),
                    TransactionState::Exit => return engine.exit(transaction),
                };
                engine.transition(&mut transaction, event)?;
            }
        }
        .boxed()
    }

    /// Failures raised here skip the error hooks and exit directly
    fn prepare(&self, transaction: &mut CommandTransaction) -> TransactionEvent {
        transaction.begin_attempt();

        for hook in transaction.hooks().listeners(Phase::Prepare) {
            match invoke(&hook, transaction) {
                HookOutcome::Continue => {}
                HookOutcome::Intercept(output) => {
                    transaction.set_result(output);
                    return TransactionEvent::Intercepted;
                }
                HookOutcome::Retry => {
                    let error = CommandError::configuration(
                        transaction,
                        "A command cannot be retried from the prepare phase",
                    );
                    transaction.set_error(error);
                    return TransactionEvent::Aborted;
                }
                HookOutcome::Fail(error) => {
                    let error = self.classify(error.into(), transaction);
                    transaction.set_error(error);
                    return TransactionEvent::Aborted;
                }
            }
            if transaction.result().is_some() {
                return TransactionEvent::Intercepted;
            }
        }

        if transaction.request().is_none() {
            let error = CommandError::configuration(transaction, MISSING_REQUEST);
            transaction.set_error(error);
            return TransactionEvent::Aborted;
        }
        TransactionEvent::Prepared
    }

    fn submit(&self, transaction: &CommandTransaction) -> Result<InFlight> {
        let request = transaction.request().cloned().ok_or_else(|| {
            self.internal_error(
                transaction,
                StateMachineError::InvalidState {
                    state: transaction.state(),
                    reason: "no request to send".to_string(),
                },
            )
        })?;

        debug!(
            method = request.method(),
            resource = request.resource(),
            attempt = transaction.attempt(),
            "submitting request"
        );
        Ok(InFlight::submit(
            self.client.transport().clone(),
            request,
            self.client.config().http_errors,
        ))
    }

    fn complete(
        &self,
        transaction: &mut CommandTransaction,
        completion: Option<Completion>,
    ) -> TransactionEvent {
        match completion {
            Some(Completion::Response(response)) => {
                transaction.set_response(Some(response));
                TransactionEvent::Completed
            }
            Some(Completion::Failure(failure)) => {
                transaction.set_response(failure.response().cloned());
                let error = self.classify(failure.into(), transaction);
                transaction.set_error(error);
                TransactionEvent::Failed
            }
            None => {
                let error = self.classify(Failure::Disconnected, transaction);
                transaction.set_error(error);
                TransactionEvent::Failed
            }
        }
    }

    fn process(&self, transaction: &mut CommandTransaction) -> TransactionEvent {
        if let Some(error) = transaction.error() {
            // Failure surfaced by a forced deferred result
            return if error.is_routed() {
                TransactionEvent::Unhandled
            } else {
                TransactionEvent::Failed
            };
        }
        if transaction.has_deferred_result() {
            return TransactionEvent::Processed;
        }

        for hook in transaction.hooks().listeners(Phase::Process) {
            match invoke(&hook, transaction) {
                HookOutcome::Continue => {}
                HookOutcome::Intercept(output) => {
                    transaction.set_result(output);
                    break;
                }
                HookOutcome::Retry => {
                    transaction.retry();
                    return TransactionEvent::Retry;
                }
                HookOutcome::Fail(error) => {
                    let error = self.classify(error.into(), transaction);
                    let routed = error.is_routed();
                    transaction.set_error(error);
                    return if routed {
                        TransactionEvent::Unhandled
                    } else {
                        TransactionEvent::Failed
                    };
                }
            }
        }
        TransactionEvent::Processed
    }

    fn handle_error(&self, transaction: &mut CommandTransaction) -> TransactionEvent {
        if let Some(mut error) = transaction.take_error() {
            error.mark_routed();
            transaction.set_error(error);
        }
        transaction.clear_result();

        for hook in transaction.hooks().listeners(Phase::Error) {
            match invoke(&hook, transaction) {
                HookOutcome::Continue => {
                    if transaction.result().is_some() {
                        return TransactionEvent::Rescued;
                    }
                }
                HookOutcome::Intercept(output) => {
                    transaction.set_result(output);
                    return TransactionEvent::Rescued;
                }
                HookOutcome::Retry => {
                    transaction.retry();
                    return TransactionEvent::Retry;
                }
                HookOutcome::Fail(error) => {
                    let mut error = self.classify(error.into(), transaction);
                    error.mark_routed();
                    transaction.set_error(error);
                }
            }
        }
        TransactionEvent::Unhandled
    }

    fn end(&self, transaction: &mut CommandTransaction) -> TransactionEvent {
        if transaction.has_deferred_result() {
            return TransactionEvent::Finished;
        }

        for hook in transaction.hooks().listeners(Phase::End) {
            match invoke(&hook, transaction) {
                HookOutcome::Continue => {}
                HookOutcome::Intercept(output) => {
                    transaction.set_result(output);
                    break;
                }
                HookOutcome::Retry => {
                    let mut error = CommandError::configuration(
                        transaction,
                        "A command cannot be retried from the end phase",
                    );
                    error.mark_routed();
                    transaction.set_error(error);
                }
                HookOutcome::Fail(error) => {
                    let mut error = self.classify(error.into(), transaction);
                    error.mark_routed();
                    transaction.set_error(error);
                }
            }
        }
        TransactionEvent::Finished
    }

    fn exit(&self, mut transaction: CommandTransaction) -> Result<CommandOutput> {
        if let Some(error) = transaction.take_error() {
            return Err(error);
        }
        match transaction.take_result() {
            Some(CommandOutput::Deferred(future)) => Ok(CommandOutput::Deferred(
                self.resume_when_forced(transaction, future),
            )),
            Some(CommandOutput::Ready(value)) => Ok(CommandOutput::Ready(value)),
            None => Ok(CommandOutput::Ready(Value::Null)),
        }
    }

    /// Park the transaction at SENT behind a future result
    fn defer(&self, transaction: CommandTransaction, in_flight: InFlight) -> FutureResult {
        let label = transaction.command().name().to_string();
        let abort = in_flight.abort_handle();
        let request = in_flight.request().clone();
        let transport = self.client.transport().clone();
        let engine = self.clone();

        FutureResult::new(move || async move {
            let mut transaction = transaction;
            let completion = in_flight.wait().await;
            let event = engine.complete(&mut transaction, completion);
            engine.transition(&mut transaction, event)?;
            engine
                .run(transaction, ExecutionMode::Inline)
                .await?
                .into_value()
                .await
        })
        .with_cancel(move || {
            debug!(resource = request.resource(), "cancelling in-flight request");
            abort.abort();
            transport.cancel(&request);
        })
        .labelled(label)
    }

    /// Wrap a deferred result so PROCESS and END run when it is forced
    fn resume_when_forced(
        &self,
        transaction: CommandTransaction,
        inner: FutureResult,
    ) -> FutureResult {
        let label = transaction.command().name().to_string();
        let slot = Arc::new(Mutex::new(Some(inner)));
        let cancel_slot = slot.clone();
        let engine = self.clone();
        let missing_label = label.clone();

        FutureResult::new(move || async move {
            let mut transaction = transaction;
            let inner = slot.lock().take();
            let Some(inner) = inner else {
                return Err(CommandError::cancelled(Some(missing_label)));
            };
            match inner.wait().await {
                Ok(value) => transaction.set_result(value),
                Err(error) => transaction.set_error(error),
            }
            engine.transition(&mut transaction, TransactionEvent::Resumed)?;
            engine
                .run(transaction, ExecutionMode::Inline)
                .await?
                .into_value()
                .await
        })
        .with_cancel(move || {
            if let Some(mut inner) = cancel_slot.lock().take() {
                inner.cancel();
            }
        })
        .labelled(label)
    }

    fn transition(
        &self,
        transaction: &mut CommandTransaction,
        event: TransactionEvent,
    ) -> Result<()> {
        let from = transaction.state();
        let to = determine_target_state(from, event)
            .map_err(|error| self.internal_error(transaction, error))?;

        debug!(
            command = transaction.command().name(),
            %from,
            %to,
            event = event.event_type(),
            attempt = transaction.attempt(),
            "transaction transition"
        );
        transaction.set_state(to);

        if let Some(publisher) = self.client.publisher() {
            publisher.publish(LifecycleEvent {
                command_id: transaction.command().id(),
                command: transaction.command().name().to_string(),
                from,
                to,
                event,
                attempt: transaction.attempt(),
                published_at: chrono::Utc::now(),
            });
        }
        Ok(())
    }

    fn classify(&self, failure: Failure, transaction: &CommandTransaction) -> CommandError {
        self.client.classifier().classify(failure, transaction)
    }

    fn internal_error(
        &self,
        transaction: &CommandTransaction,
        error: StateMachineError,
    ) -> CommandError {
        CommandError::new(
            ErrorKind::Command,
            ErrorDetails::from_transaction(transaction, error.to_string()).with_cause(Arc::new(error)),
        )
    }
}

/// Run a hook; a bare `retry()` call on the transaction counts as a retry outcome
fn invoke(hook: &Hook, transaction: &mut CommandTransaction) -> HookOutcome {
    let outcome = hook(transaction);
    if matches!(outcome, HookOutcome::Continue) && transaction.take_retry_request() {
        HookOutcome::Retry
    } else {
        outcome
    }
}
