pub mod bridge;
pub mod publisher;

// Re-export key types for convenience
pub use bridge::{Completion, EventBridge, InFlight};
pub use publisher::{EventPublisher, LifecycleEvent};
