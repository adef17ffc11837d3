#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Command Core
//!
//! Command transaction lifecycle engine underneath service-client SDKs.
//!
//! ## Overview
//!
//! Callers issue named, parameterized **commands** against a remote service
//! through a pluggable [`Transport`](execution::transport::Transport). Each
//! execution is a [`CommandTransaction`](state_machine::transaction::CommandTransaction)
//! driven through `PREPARE → SENT → {PROCESS | ERROR} → END → EXIT`, with
//! hooks that can build the request, intercept, rescue or retry. Failures
//! surface as typed [`CommandError`]s carrying the transaction that produced them.
//!
//! ## Module Organization
//!
//! - [`client`] - `ServiceClient` façade and builder
//! - [`state_machine`] - States, events, hooks, transactions and the lifecycle engine
//! - [`execution`] - Commands, transport seam, error classification, future results, batches
//! - [`events`] - Transport completion bridge and lifecycle event publishing
//! - [`subscribers`] - Bundled hook sets (result mocking, debug tracing)
//! - [`config`] - Client configuration
//! - [`error`] - Typed command errors
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use command_core::prelude::*;
//! use command_core::test_utils::{result_from_body, JsonSerializer, MockReply, MockTransport};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new();
//! transport.push(MockReply::respond(Response::json(200, json!({"item": "widget"}))));
//!
//! let client = ServiceClient::builder(transport)
//!     .serializer(JsonSerializer)
//!     .build()
//!     .unwrap();
//!
//! let mut command = Command::named("GetItem").with_param("id", json!(1));
//! command.on(Phase::Process, priority::NORMAL, result_from_body);
//!
//! let item = client.execute_value(command).await.unwrap();
//! assert_eq!(item, json!({"item": "widget"}));
//! # });
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod model;
pub mod state_machine;
pub mod subscribers;
pub mod test_utils;

pub use client::{RequestSerializer, ServiceClient, ServiceClientBuilder};
pub use config::{ClientConfig, ConfigError};
pub use error::{CommandError, ErrorKind, Result};
pub use execution::{
    BatchOptions, BatchResults, Command, CommandId, CommandOutput, FutureResult, Request,
    Response, Transport, TransportFailure,
};
pub use model::Model;
pub use state_machine::{CommandTransaction, HookOutcome, LifecycleEngine, Phase, TransactionState};

/// Common imports for SDK code
pub mod prelude {
    pub use crate::client::{RequestSerializer, ServiceClient};
    pub use crate::constants::priority;
    pub use crate::error::{CommandError, ErrorKind};
    pub use crate::execution::batch_executor::{BatchOptions, BatchResults};
    pub use crate::execution::command::{Command, CommandId};
    pub use crate::execution::future_result::{CommandOutput, FutureResult};
    pub use crate::execution::transport::{Request, Response, Transport, TransportFailure};
    pub use crate::state_machine::hooks::{HookOutcome, Phase, Subscriber};
    pub use crate::state_machine::transaction::CommandTransaction;
}
