//! # Command Errors
//!
//! Typed failures raised by command execution. Every variant except
//! [`CommandError::Cancelled`] carries the [`ErrorDetails`] of the transaction
//! that produced it, so callers can inspect the command, request, response and
//! context of the failed attempt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::client::ServiceClient;
use crate::execution::command::Command;
use crate::execution::transport::{Request, Response};
use crate::state_machine::transaction::{CommandTransaction, Context};

/// Shared, clonable underlying cause of a command error
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a [`CommandError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport failure without a 4xx/5xx response, or a hook failure
    Command,
    /// Response status in `[400, 500)`
    Client,
    /// Response status in `[500, 600)`
    Server,
    /// No request was produced and nothing intercepted; never retried
    Configuration,
    /// A cancelled future result was accessed
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::Configuration => write!(f, "configuration"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Snapshot of the transaction an error originated from
#[derive(Clone)]
pub struct ErrorDetails {
    message: String,
    client: ServiceClient,
    command: Arc<Command>,
    request: Option<Request>,
    response: Option<Response>,
    context: Context,
    attempt: u32,
    cause: Option<Cause>,
    routed: bool,
}

impl ErrorDetails {
    /// Capture the current state of a transaction
    pub fn from_transaction(transaction: &CommandTransaction, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            client: transaction.client().clone(),
            command: transaction.command_arc().clone(),
            request: transaction.request().cloned(),
            response: transaction.response().cloned(),
            context: transaction.context().clone(),
            attempt: transaction.attempt(),
            cause: None,
            routed: false,
        }
    }

    /// Details for a command that never produced a transaction snapshot
    pub fn for_command(
        client: ServiceClient,
        command: Arc<Command>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            client,
            command,
            request: None,
            response: None,
            context: Context::new(),
            attempt: 0,
            cause: None,
            routed: false,
        }
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_response(mut self, response: Option<Response>) -> Self {
        if response.is_some() {
            self.response = response;
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (command {}, attempt {})",
            self.message,
            self.command.name(),
            self.attempt
        )
    }
}

/// Source of a [`CommandError`]; its own source is the underlying cause
impl std::error::Error for ErrorDetails {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Debug for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDetails")
            .field("message", &self.message)
            .field("client", &self.client.name())
            .field("command", &self.command.name())
            .field("command_id", &self.command.id())
            .field("status", &self.response.as_ref().map(Response::status))
            .field("attempt", &self.attempt)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .field("routed", &self.routed)
            .finish()
    }
}

/// Error raised by command execution
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    #[error("Error executing command: {}", .0.message)]
    Command(#[source] Box<ErrorDetails>),

    #[error("Error executing command (client error response): {}", .0.message)]
    Client(#[source] Box<ErrorDetails>),

    #[error("Error executing command (server error response): {}", .0.message)]
    Server(#[source] Box<ErrorDetails>),

    #[error("Configuration error: {}", .0.message)]
    Configuration(#[source] Box<ErrorDetails>),

    #[error("{}", cancelled_message(.command.as_deref()))]
    Cancelled { command: Option<String> },
}

fn cancelled_message(command: Option<&str>) -> String {
    match command {
        Some(name) => format!("Cannot access the result of cancelled command {name}"),
        None => "Cannot access the result of a cancelled future".to_string(),
    }
}

impl CommandError {
    /// Build an error of the given kind from transaction details
    pub fn new(kind: ErrorKind, details: ErrorDetails) -> Self {
        let details = Box::new(details);
        match kind {
            ErrorKind::Command => Self::Command(details),
            ErrorKind::Client => Self::Client(details),
            ErrorKind::Server => Self::Server(details),
            ErrorKind::Configuration => Self::Configuration(details),
            ErrorKind::Cancelled => Self::Cancelled {
                command: Some(details.command.name().to_string()),
            },
        }
    }

    pub fn configuration(transaction: &CommandTransaction, message: impl Into<String>) -> Self {
        Self::Configuration(Box::new(ErrorDetails::from_transaction(
            transaction,
            message,
        )))
    }

    pub fn cancelled(command: Option<String>) -> Self {
        Self::Cancelled { command }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Command(_) => ErrorKind::Command,
            Self::Client(_) => ErrorKind::Client,
            Self::Server(_) => ErrorKind::Server,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Self::Command(details)
            | Self::Client(details)
            | Self::Server(details)
            | Self::Configuration(details) => Some(details),
            Self::Cancelled { .. } => None,
        }
    }

    fn details_mut(&mut self) -> Option<&mut ErrorDetails> {
        match self {
            Self::Command(details)
            | Self::Client(details)
            | Self::Server(details)
            | Self::Configuration(details) => Some(details),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self.details() {
            Some(details) => details.message.clone(),
            None => self.to_string(),
        }
    }

    pub fn client(&self) -> Option<&ServiceClient> {
        self.details().map(ErrorDetails::client)
    }

    pub fn command(&self) -> Option<&Command> {
        self.details().map(ErrorDetails::command)
    }

    pub fn request(&self) -> Option<&Request> {
        self.details().and_then(ErrorDetails::request)
    }

    pub fn response(&self) -> Option<&Response> {
        self.details().and_then(ErrorDetails::response)
    }

    pub fn context(&self) -> Option<&Context> {
        self.details().map(ErrorDetails::context)
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.details().and_then(ErrorDetails::cause)
    }

    pub fn attempt(&self) -> Option<u32> {
        self.details().map(ErrorDetails::attempt)
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Client(_))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether this error has already been delivered to the error hooks
    pub fn is_routed(&self) -> bool {
        self.details().is_some_and(|details| details.routed)
    }

    pub(crate) fn mark_routed(&mut self) {
        if let Some(details) = self.details_mut() {
            details.routed = true;
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
