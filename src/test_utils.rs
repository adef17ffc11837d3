//! # Test Utilities
//!
//! Scripted transport and helpers shared by unit tests, integration tests and
//! benchmarks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{RequestSerializer, ServiceClient};
use crate::execution::command::Command;
use crate::execution::transport::{Request, Response, Transport, TransportFailure};
use crate::state_machine::hooks::HookOutcome;
use crate::state_machine::transaction::CommandTransaction;

/// One scripted transport outcome
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(Response),
    Fail(TransportFailure),
    /// Never resolves; used to test cancellation
    Hold,
}

impl MockReply {
    pub fn respond(response: Response) -> Self {
        Self::Respond(response)
    }

    pub fn status(status: u16) -> Self {
        Self::Respond(Response::new(status))
    }

    pub fn fail(failure: TransportFailure) -> Self {
        Self::Fail(failure)
    }
}

type Responder = Arc<dyn Fn(&Request) -> Result<Response, TransportFailure> + Send + Sync>;

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    responder: Mutex<Option<Responder>>,
    latency: Mutex<Option<Duration>>,
    requests: Mutex<Vec<Request>>,
    sends: AtomicUsize,
    cancels: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Transport replaying queued replies, then falling back to a responder
///
/// Clones share the queue and counters.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: MockReply) -> &Self {
        self.state.replies.lock().push_back(reply);
        self
    }

    /// Answer requests with `responder` once the queue is empty
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: Fn(&Request) -> Result<Response, TransportFailure> + Send + Sync + 'static,
    {
        *self.state.responder.lock() = Some(Arc::new(responder));
        self
    }

    /// Delay every send
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.state.latency.lock() = Some(latency);
        self
    }

    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn send_count(&self) -> usize {
        self.state.sends.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.state.cancels.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<Request> {
        self.state.requests.lock().clone()
    }

    pub fn queued(&self) -> usize {
        self.state.replies.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportFailure> {
        self.state.sends.fetch_add(1, Ordering::SeqCst);
        self.state.requests.lock().push(request.clone());

        let current = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.state.in_flight);

        let latency = *self.state.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self.state.replies.lock().pop_front();
        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(failure)) => Err(failure),
            Some(MockReply::Hold) => std::future::pending().await,
            None => {
                let responder = self.state.responder.lock().clone();
                match responder {
                    Some(responder) => responder(&request),
                    None => Err(TransportFailure::new("Mock transport has no reply queued")),
                }
            }
        }
    }

    fn cancel(&self, _request: &Request) {
        self.state.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serializes a command into `POST /{name}` with its params as the JSON body
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl RequestSerializer for JsonSerializer {
    fn serialize(&self, transaction: &CommandTransaction) -> anyhow::Result<Request> {
        let body = serde_json::to_value(transaction.command().params())?;
        Ok(
            Request::new("POST", format!("/{}", transaction.command().name()))
                .with_header("Content-Type", "application/json")
                .with_body(body),
        )
    }
}

/// Process hook copying the response body into the result
pub fn result_from_body(transaction: &mut CommandTransaction) -> HookOutcome {
    if let Some(body) = transaction.response().map(|response| response.body().clone()) {
        transaction.set_result(body);
    }
    HookOutcome::Continue
}

/// Fresh transaction for a `GetItem` command on a default client
pub fn sample_transaction() -> CommandTransaction {
    let client = ServiceClient::new(MockTransport::new());
    let command = Command::named("GetItem").with_param("id", json!(1));
    CommandTransaction::new(client, Arc::new(command))
}
