//! Transport Layer Abstraction
//!
//! The engine never talks to the network itself. A [`Transport`] receives a
//! fully prepared [`Request`] and resolves it into a [`Response`] or a
//! [`TransportFailure`]. The dispatcher in this module runs the send on its own
//! task and reports the outcome on the request's [`RequestEvents`], which is
//! where the event bridge picks it up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::request_events::{ErrorDisposition, RequestEvents};

/// Request handed to the transport
#[derive(Clone)]
pub struct Request {
    method: String,
    resource: String,
    headers: HashMap<String, String>,
    body: Option<Value>,
    config: HashMap<String, Value>,
    events: RequestEvents,
}

impl Request {
    pub fn new(method: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            resource: resource.into(),
            headers: HashMap::new(),
            body: None,
            config: HashMap::new(),
            events: RequestEvents::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn config(&self) -> &HashMap<String, Value> {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.config
    }

    /// The request's completion/failure event surface
    pub fn events(&self) -> &RequestEvents {
        &self.events
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("resource", &self.resource)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("config", &self.config)
            .field("events", &self.events)
            .finish()
    }
}

/// Response received from the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: u16,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Value,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Value::Null,
        }
    }

    /// Response with a JSON body
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Failure reported by the transport, optionally with the response that caused it
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportFailure {
    message: String,
    response: Option<Response>,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
        }
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Failure raised for an error status when `http_errors` is enabled
    pub fn from_status(request: &Request, response: Response) -> Self {
        let label = if response.is_client_error() {
            "Client error"
        } else if response.is_server_error() {
            "Server error"
        } else {
            "Unsuccessful"
        };
        Self::new(format!(
            "{label} response [resource] {} [status code] {}",
            request.resource(),
            response.status()
        ))
        .with_response(response)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }
}

/// The request/response execution mechanism the engine submits requests to
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send the request and resolve it once
    async fn send(&self, request: Request) -> Result<Response, TransportFailure>;

    /// Abandon an in-flight request; called when a deferred result is cancelled
    fn cancel(&self, _request: &Request) {}
}

/// Final transport-level outcome of a dispatched request
#[derive(Debug)]
pub enum Delivery {
    /// A response reached the complete listeners
    Completed(Response),
    /// A listener claimed the failure
    Claimed,
    /// No listener claimed the failure
    Unhandled(TransportFailure),
}

/// Report an outcome on the request's events
pub fn deliver(
    request: &Request,
    outcome: Result<Response, TransportFailure>,
    http_errors: bool,
) -> Delivery {
    let outcome = match outcome {
        Ok(response) if http_errors && response.status() >= 400 => {
            Err(TransportFailure::from_status(request, response))
        }
        other => other,
    };

    match outcome {
        Ok(response) => {
            request.events().emit_complete(&response);
            Delivery::Completed(response)
        }
        Err(failure) => match request.events().emit_error(failure) {
            ErrorDisposition::Recovered(response) => {
                debug!(
                    resource = request.resource(),
                    status = response.status(),
                    "transport failure recovered by listener"
                );
                request.events().emit_complete(&response);
                Delivery::Completed(response)
            }
            ErrorDisposition::Suppressed => Delivery::Claimed,
            ErrorDisposition::Unhandled(failure) => {
                warn!(
                    resource = request.resource(),
                    error = %failure,
                    "transport failure was not claimed by any listener"
                );
                Delivery::Unhandled(failure)
            }
        },
    }
}

/// Send a request and deliver the outcome on its events
pub async fn dispatch(transport: Arc<dyn Transport>, request: Request, http_errors: bool) -> Delivery {
    let outcome = transport.send(request.clone()).await;
    deliver(&request, outcome, http_errors)
}
