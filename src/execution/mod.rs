//! # Execution
//!
//! Command model, the transport seam, failure classification, deferred
//! results and bounded-concurrency batch execution.

pub mod batch_executor;
pub mod command;
pub mod error_classifier;
pub mod future_result;
pub mod request_events;
pub mod transport;

pub use batch_executor::{BatchExecutor, BatchOptions, BatchResults, Outcome};
pub use command::{Command, CommandId};
pub use error_classifier::{ErrorClassifier, Failure, StandardErrorClassifier};
pub use future_result::{CommandOutput, FutureResult};
pub use request_events::{ErrorAction, ErrorDisposition, RequestEvents};
pub use transport::{Delivery, Request, Response, Transport, TransportFailure};
