use serde::{Deserialize, Serialize};

/// Events that drive transaction state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionEvent {
    /// A request was prepared
    Prepared,
    /// A prepare hook supplied the result
    Intercepted,
    /// The transport delivered a response
    Completed,
    /// The transport or a hook failed
    Failed,
    /// Process hooks finished without failing
    Processed,
    /// An error hook supplied a result
    Rescued,
    /// A hook asked for a fresh attempt
    Retry,
    /// The error was left for the caller
    Unhandled,
    /// End hooks finished
    Finished,
    /// Prepare could not continue
    Aborted,
    /// A deferred result was forced
    Resumed,
}

impl TransactionEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::Intercepted => "intercepted",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Processed => "processed",
            Self::Rescued => "rescued",
            Self::Retry => "retry",
            Self::Unhandled => "unhandled",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
            Self::Resumed => "resumed",
        }
    }

    /// Check if this event starts a new attempt
    pub fn restarts_attempt(&self) -> bool {
        matches!(self, Self::Retry)
    }
}
