use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::constants::defaults;
use crate::execution::command::CommandId;
use crate::state_machine::events::TransactionEvent;
use crate::state_machine::states::TransactionState;

/// A state transition of one command transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub command_id: CommandId,
    pub command: String,
    pub from: TransactionState,
    pub to: TransactionState,
    pub event: TransactionEvent,
    pub attempt: u32,
    pub published_at: DateTime<Utc>,
}

/// Broadcast publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns how many subscribers received it
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        // No subscribers is not an error for lifecycle publishing
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(defaults::EVENT_CHANNEL_CAPACITY)
    }
}
