//! # Request Event Surface
//!
//! Every [`Request`](super::transport::Request) carries a `RequestEvents`
//! emitter. Listeners register for completion or failure of the attempt with a
//! priority; the transport dispatcher emits exactly one of the two when the
//! attempt resolves. Listeners are shared between clones of the same request.

use parking_lot::Mutex;
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use super::transport::{Response, TransportFailure};

type CompleteListener = Arc<dyn Fn(&Response) + Send + Sync>;
type ErrorListener = Arc<dyn Fn(&TransportFailure) -> ErrorAction + Send + Sync>;

/// Decision returned by an error listener
#[derive(Debug, Clone)]
pub enum ErrorAction {
    /// Let the next listener see the failure
    Continue,
    /// Replace the failure with a response; complete listeners fire next
    Recover(Response),
    /// Stop the failure from propagating out of the transport layer
    StopPropagation,
}

/// What happened to a failure after all error listeners ran
#[derive(Debug, Clone)]
pub enum ErrorDisposition {
    Recovered(Response),
    Suppressed,
    Unhandled(TransportFailure),
}

struct Registration<L> {
    priority: i32,
    sequence: u64,
    listener: L,
}

#[derive(Default)]
struct Listeners {
    complete: Vec<Registration<CompleteListener>>,
    error: Vec<Registration<ErrorListener>>,
    next_sequence: u64,
}

impl Listeners {
    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

fn ordered<L: Clone>(registrations: &[Registration<L>]) -> Vec<L> {
    let mut sorted: Vec<&Registration<L>> = registrations.iter().collect();
    sorted.sort_by_key(|r| (Reverse(r.priority), r.sequence));
    sorted.into_iter().map(|r| r.listener.clone()).collect()
}

/// Priority-ordered listener registry for one request
#[derive(Clone, Default)]
pub struct RequestEvents {
    inner: Arc<Mutex<Listeners>>,
}

impl RequestEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a completed attempt
    pub fn on_complete<F>(&self, priority: i32, listener: F)
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        let mut listeners = self.inner.lock();
        let sequence = listeners.next_sequence();
        listeners.complete.push(Registration {
            priority,
            sequence,
            listener: Arc::new(listener),
        });
    }

    /// Register a listener for a failed attempt
    pub fn on_error<F>(&self, priority: i32, listener: F)
    where
        F: Fn(&TransportFailure) -> ErrorAction + Send + Sync + 'static,
    {
        let mut listeners = self.inner.lock();
        let sequence = listeners.next_sequence();
        listeners.error.push(Registration {
            priority,
            sequence,
            listener: Arc::new(listener),
        });
    }

    /// Notify complete listeners in priority order
    pub fn emit_complete(&self, response: &Response) {
        // Snapshot so listeners may register further listeners without deadlocking
        let listeners = ordered(&self.inner.lock().complete);
        for listener in listeners {
            listener(response);
        }
    }

    /// Notify error listeners in priority order until one recovers or stops propagation
    pub fn emit_error(&self, failure: TransportFailure) -> ErrorDisposition {
        let listeners = ordered(&self.inner.lock().error);
        for listener in listeners {
            match listener(&failure) {
                ErrorAction::Continue => {}
                ErrorAction::Recover(response) => return ErrorDisposition::Recovered(response),
                ErrorAction::StopPropagation => return ErrorDisposition::Suppressed,
            }
        }
        ErrorDisposition::Unhandled(failure)
    }

    pub fn complete_listener_count(&self) -> usize {
        self.inner.lock().complete.len()
    }

    pub fn error_listener_count(&self) -> usize {
        self.inner.lock().error.len()
    }
}

impl fmt::Debug for RequestEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.inner.lock();
        f.debug_struct("RequestEvents")
            .field("complete", &listeners.complete.len())
            .field("error", &listeners.error.len())
            .finish()
    }
}
