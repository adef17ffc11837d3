//! Command Model
//!
//! A [`Command`] is a named, parameterized operation plus the lifecycle hooks
//! that apply only to it. It holds no phase logic; the lifecycle engine drives
//! it through a [`CommandTransaction`](crate::state_machine::transaction::CommandTransaction).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::state_machine::hooks::{HookOutcome, HookRegistry, Phase, Subscriber};
use crate::state_machine::transaction::CommandTransaction;

/// Identity of a command; keys the batch outcome map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named operation with parameters, per-command config and hooks
///
/// # Examples
///
/// ```rust
/// use command_core::execution::command::Command;
/// use serde_json::json;
///
/// let command = Command::named("GetItem").with_param("id", json!(1));
/// assert_eq!(command.param("id"), Some(&json!(1)));
/// assert!(!command.has_param("missing"));
///
/// // A clone is a new command with its own hook list
/// let copy = command.clone();
/// assert_ne!(copy.id(), command.id());
/// ```
pub struct Command {
    id: CommandId,
    name: String,
    params: HashMap<String, Value>,
    config: HashMap<String, Value>,
    hooks: HookRegistry,
    future: bool,
}

impl Command {
    pub fn new(name: impl Into<String>, params: HashMap<String, Value>) -> Self {
        Self::with_hooks(name, params, HookRegistry::new())
    }

    /// Create a command with a pre-built hook registry
    pub fn with_hooks(
        name: impl Into<String>,
        params: HashMap<String, Value>,
        hooks: HookRegistry,
    ) -> Self {
        Self {
            id: CommandId::new(),
            name: name.into(),
            params,
            config: HashMap::new(),
            hooks,
            future: false,
        }
    }

    /// Create a command with no parameters
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, HashMap::new())
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Request deferred execution; `execute` then returns a future result
    pub fn with_future(mut self, future: bool) -> Self {
        self.future = future;
        self
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn params(&self) -> &HashMap<String, Value> {
        &self.params
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: Value) {
        self.params.insert(key.into(), value);
    }

    pub fn config(&self) -> &HashMap<String, Value> {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.config
    }

    pub fn is_future(&self) -> bool {
        self.future
    }

    /// Register a hook for one phase of this command's lifecycle
    pub fn on<F>(&mut self, phase: Phase, priority: i32, hook: F) -> &mut Self
    where
        F: Fn(&mut CommandTransaction) -> HookOutcome + Send + Sync + 'static,
    {
        self.hooks.on(phase, priority, hook);
        self
    }

    /// Attach every hook a subscriber provides
    pub fn subscribe(&mut self, subscriber: &dyn Subscriber) -> &mut Self {
        subscriber.register(&mut self.hooks);
        self
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }
}

impl Clone for Command {
    fn clone(&self) -> Self {
        Self {
            id: CommandId::new(),
            name: self.name.clone(),
            params: self.params.clone(),
            config: self.config.clone(),
            hooks: self.hooks.clone(),
            future: self.future,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .field("future", &self.future)
            .finish()
    }
}
