//! # Event Bridge
//!
//! Connects the engine's SENT state to the completion notification on the
//! request's own [`RequestEvents`](crate::execution::request_events::RequestEvents).
//! One listener pair is attached per attempt in the reserved `LATE` band, so
//! user-level transport listeners always see the outcome first. Delivery goes
//! through a one-shot channel guarded by a flag; a second delivery for the same
//! attempt is logged and dropped.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use crate::constants::priority;
use crate::execution::request_events::ErrorAction;
use crate::execution::transport::{dispatch, Delivery, Request, Response, Transport, TransportFailure};

/// Outcome of one transport attempt as seen by the engine
#[derive(Debug, Clone)]
pub enum Completion {
    Response(Response),
    Failure(TransportFailure),
}

struct CompletionSlot {
    fired: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<Completion>>>,
}

impl CompletionSlot {
    /// Forward the first completion; returns false once the slot is spent
    fn deliver(&self, completion: Completion) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            warn!(?completion, "duplicate transport completion ignored");
            return false;
        }
        if let Some(sender) = self.sender.lock().take() {
            if sender.send(completion).is_err() {
                debug!("transaction stopped waiting before the transport completed");
            }
        }
        true
    }
}

/// Attaches the engine's completion listeners to a request
pub struct EventBridge;

impl EventBridge {
    /// Register the `LATE` listeners and return the receiving end
    pub fn attach(request: &Request) -> oneshot::Receiver<Completion> {
        let (sender, receiver) = oneshot::channel();
        let slot = Arc::new(CompletionSlot {
            fired: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        });

        let on_complete = slot.clone();
        request.events().on_complete(priority::LATE, move |response| {
            on_complete.deliver(Completion::Response(response.clone()));
        });
        request.events().on_error(priority::LATE, move |failure| {
            if slot.deliver(Completion::Failure(failure.clone())) {
                // The command layer owns the failure from here on
                ErrorAction::StopPropagation
            } else {
                // Spent listener from an earlier attempt on a reused request
                ErrorAction::Continue
            }
        });

        receiver
    }
}

/// A request parked in SENT
pub struct InFlight {
    request: Request,
    receiver: oneshot::Receiver<Completion>,
    handle: JoinHandle<Delivery>,
}

impl InFlight {
    /// Attach the bridge and hand the request to the transport on its own task
    pub fn submit(transport: Arc<dyn Transport>, request: Request, http_errors: bool) -> Self {
        let receiver = EventBridge::attach(&request);
        let handle = tokio::spawn(dispatch(transport, request.clone(), http_errors));
        Self {
            request,
            receiver,
            handle,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Resume once the transport task has reported; `None` if nothing reached the bridge
    pub async fn wait(self) -> Option<Completion> {
        let Self {
            request,
            mut receiver,
            handle,
        } = self;

        let joined = handle.await;
        if let Ok(completion) = receiver.try_recv() {
            return Some(completion);
        }

        match joined {
            Ok(Delivery::Claimed) => debug!(
                resource = request.resource(),
                "transport failure claimed before reaching the command layer"
            ),
            Ok(delivery) => debug!(resource = request.resource(), ?delivery, "bridge not notified"),
            Err(error) => warn!(resource = request.resource(), %error, "transport task ended abnormally"),
        }
        None
    }
}
