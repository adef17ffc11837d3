//! # Command Transaction
//!
//! The mutable unit of work for one command execution, carried across retries.
//! Only the lifecycle engine and hook callbacks mutate it.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::hooks::HookRegistry;
use super::states::TransactionState;
use crate::client::ServiceClient;
use crate::error::CommandError;
use crate::execution::command::Command;
use crate::execution::future_result::CommandOutput;
use crate::execution::transport::{Request, Response};

/// Free-form map for data shared between hooks
pub type Context = HashMap<String, Value>;

pub struct CommandTransaction {
    client: ServiceClient,
    command: Arc<Command>,
    hooks: HookRegistry,
    state: TransactionState,
    request: Option<Request>,
    response: Option<Response>,
    result: Option<CommandOutput>,
    error: Option<CommandError>,
    context: Context,
    attempt: u32,
    retry_requested: bool,
}

impl CommandTransaction {
    /// Start a transaction; client-wide hooks are merged ahead of the command's
    pub fn new(client: ServiceClient, command: Arc<Command>) -> Self {
        let hooks = HookRegistry::merged(client.hooks(), command.hooks());
        Self {
            client,
            command,
            hooks,
            state: TransactionState::default(),
            request: None,
            response: None,
            result: None,
            error: None,
            context: Context::new(),
            attempt: 0,
            retry_requested: false,
        }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn command_arc(&self) -> &Arc<Command> {
        &self.command
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    pub fn set_request(&mut self, request: Request) {
        self.request = Some(request);
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn result(&self) -> Option<&CommandOutput> {
        self.result.as_ref()
    }

    /// The ready result value, if one is set and not deferred
    pub fn result_value(&self) -> Option<&Value> {
        self.result.as_ref().and_then(CommandOutput::as_value)
    }

    /// Set the result. From the error or end phase this also clears the error.
    pub fn set_result(&mut self, result: impl Into<CommandOutput>) {
        self.result = Some(result.into());
        if matches!(self.state, TransactionState::Error | TransactionState::End) {
            self.error = None;
        }
    }

    pub fn error(&self) -> Option<&CommandError> {
        self.error.as_ref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// 1-based attempt number; incremented on every pass through prepare
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Discard the current attempt and restart at prepare
    pub fn retry(&mut self) {
        self.result = None;
        self.error = None;
        self.request = None;
        self.response = None;
        self.retry_requested = true;
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.attempt += 1;
        self.retry_requested = false;
    }

    pub(crate) fn take_retry_request(&mut self) -> bool {
        std::mem::take(&mut self.retry_requested)
    }

    pub(crate) fn set_response(&mut self, response: Option<Response>) {
        self.response = response;
    }

    pub(crate) fn set_error(&mut self, error: CommandError) {
        self.error = Some(error);
    }

    pub(crate) fn take_error(&mut self) -> Option<CommandError> {
        self.error.take()
    }

    pub(crate) fn clear_result(&mut self) {
        self.result = None;
    }

    pub(crate) fn take_result(&mut self) -> Option<CommandOutput> {
        self.result.take()
    }

    pub(crate) fn has_deferred_result(&self) -> bool {
        self.result.as_ref().is_some_and(CommandOutput::is_deferred)
    }
}

impl fmt::Debug for CommandTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTransaction")
            .field("client", &self.client.name())
            .field("command", &self.command.name())
            .field("command_id", &self.command.id())
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .field("request", &self.request.as_ref().map(Request::resource))
            .field("response", &self.response.as_ref().map(Response::status))
            .field("result", &self.result)
            .field("error", &self.error.as_ref().map(ToString::to_string))
            .field("context", &self.context)
            .finish()
    }
}
