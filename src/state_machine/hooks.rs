//! # Lifecycle Hooks
//!
//! Hooks are typed callbacks registered per [`Phase`] with an integer
//! priority. Each returns an explicit [`HookOutcome`] instead of signalling
//! through errors or stop-propagation flags.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use super::transaction::CommandTransaction;
use crate::execution::future_result::CommandOutput;

/// Phase a hook is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prepare,
    Process,
    Error,
    End,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Prepare, Phase::Process, Phase::Error, Phase::End];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => write!(f, "prepare"),
            Self::Process => write!(f, "process"),
            Self::Error => write!(f, "error"),
            Self::End => write!(f, "end"),
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepare" => Ok(Self::Prepare),
            "process" => Ok(Self::Process),
            "error" => Ok(Self::Error),
            "end" => Ok(Self::End),
            _ => Err(format!("Invalid lifecycle phase: {s}")),
        }
    }
}

/// What a hook asks the engine to do next
#[derive(Debug)]
pub enum HookOutcome {
    /// Hand control to the next hook in the phase
    Continue,
    /// Supply the result and halt the remaining hooks of the phase
    Intercept(CommandOutput),
    /// Discard the attempt and restart at prepare
    Retry,
    /// Fail the phase with an error
    Fail(anyhow::Error),
}

impl HookOutcome {
    pub fn intercept(output: impl Into<CommandOutput>) -> Self {
        Self::Intercept(output.into())
    }

    pub fn fail(error: impl Into<anyhow::Error>) -> Self {
        Self::Fail(error.into())
    }
}

/// Shared hook callback
pub type Hook = Arc<dyn Fn(&mut CommandTransaction) -> HookOutcome + Send + Sync>;

#[derive(Clone)]
struct Registration {
    phase: Phase,
    priority: i32,
    sequence: u64,
    hook: Hook,
}

/// Ordered hook registrations for every phase
///
/// Cloning copies the registration list; hooks added to a clone are never
/// visible to the registry it came from.
#[derive(Clone, Default)]
pub struct HookRegistry {
    registrations: Vec<Registration>,
    next_sequence: u64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook
    pub fn on<F>(&mut self, phase: Phase, priority: i32, hook: F) -> &mut Self
    where
        F: Fn(&mut CommandTransaction) -> HookOutcome + Send + Sync + 'static,
    {
        self.on_hook(phase, priority, Arc::new(hook))
    }

    /// Register an already shared hook
    pub fn on_hook(&mut self, phase: Phase, priority: i32, hook: Hook) -> &mut Self {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.registrations.push(Registration {
            phase,
            priority,
            sequence,
            hook,
        });
        self
    }

    /// Hooks of one phase, highest priority first, ties in registration order
    pub fn listeners(&self, phase: Phase) -> Vec<Hook> {
        let mut matching: Vec<&Registration> = self
            .registrations
            .iter()
            .filter(|r| r.phase == phase)
            .collect();
        matching.sort_by_key(|r| (Reverse(r.priority), r.sequence));
        matching.into_iter().map(|r| r.hook.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.registrations.iter().filter(|r| r.phase == phase).count()
    }

    /// Append every registration of `other`, after the ones already present
    pub fn extend(&mut self, other: &HookRegistry) {
        let mut incoming = other.registrations.clone();
        incoming.sort_by_key(|r| r.sequence);
        for registration in incoming {
            self.on_hook(registration.phase, registration.priority, registration.hook);
        }
    }

    /// Client-wide hooks followed by the command's own hooks
    pub fn merged(client: &HookRegistry, command: &HookRegistry) -> HookRegistry {
        let mut merged = client.clone();
        merged.extend(command);
        merged
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for phase in Phase::ALL {
            map.entry(&phase.to_string(), &self.count(phase));
        }
        map.finish()
    }
}

/// A bundle of hooks attached in one call
pub trait Subscriber: Send + Sync {
    fn register(&self, hooks: &mut HookRegistry);
}
