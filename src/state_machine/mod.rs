// State machine module for command transactions
//
// States and events of one command execution, the hook registry consulted in
// each phase, and the engine that drives a transaction from prepare to exit.

pub mod errors;
pub mod events;
pub mod hooks;
pub mod lifecycle_engine;
pub mod states;
pub mod transaction;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::TransactionEvent;
pub use hooks::{Hook, HookOutcome, HookRegistry, Phase, Subscriber};
pub use lifecycle_engine::{determine_target_state, ExecutionMode, LifecycleEngine};
pub use states::TransactionState;
pub use transaction::{CommandTransaction, Context};
