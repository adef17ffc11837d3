//! Debug subscriber: traces each phase of a command with its duration.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::constants::{context_keys, priority};
use crate::execution::request_events::ErrorAction;
use crate::state_machine::hooks::{HookOutcome, HookRegistry, Phase, Subscriber};
use crate::state_machine::transaction::CommandTransaction;

/// Logs phase boundaries through `tracing`
#[derive(Debug, Clone, Copy)]
pub struct DebugSubscriber {
    http: bool,
}

impl DebugSubscriber {
    pub fn new() -> Self {
        Self { http: true }
    }

    /// Also trace the transport outcome of every prepared request
    pub fn with_http(mut self, http: bool) -> Self {
        self.http = http;
        self
    }
}

impl Default for DebugSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

fn elapsed_us(transaction: &CommandTransaction, key: &str) -> Option<i64> {
    transaction
        .context()
        .get(key)
        .and_then(Value::as_i64)
        .map(|started| now_us() - started)
}

fn start_phase(transaction: &mut CommandTransaction, phase: Phase) {
    transaction
        .context_mut()
        .insert(context_keys::DEBUG_PHASE_STARTED_AT.to_string(), json!(now_us()));
    debug!(
        command = transaction.command().name(),
        command_id = %transaction.command().id(),
        %phase,
        attempt = transaction.attempt(),
        params = ?transaction.command().params(),
        "starting phase"
    );
}

fn finish_phase(transaction: &CommandTransaction, phase: Phase) {
    debug!(
        command = transaction.command().name(),
        command_id = %transaction.command().id(),
        %phase,
        took_us = elapsed_us(transaction, context_keys::DEBUG_PHASE_STARTED_AT),
        error = ?transaction.error().map(ToString::to_string),
        "done with phase"
    );
}

impl Subscriber for DebugSubscriber {
    fn register(&self, hooks: &mut HookRegistry) {
        hooks.on(Phase::Prepare, priority::FIRST, |transaction| {
            transaction
                .context_mut()
                .entry(context_keys::DEBUG_STARTED_AT.to_string())
                .or_insert_with(|| json!(now_us()));
            info!(
                command = transaction.command().name(),
                command_id = %transaction.command().id(),
                attempt = transaction.attempt(),
                "starting command"
            );
            start_phase(transaction, Phase::Prepare);
            HookOutcome::Continue
        });

        let http = self.http;
        hooks.on(Phase::Prepare, priority::LAST, move |transaction| {
            finish_phase(transaction, Phase::Prepare);
            if let (true, Some(request)) = (http, transaction.request()) {
                let resource = request.resource().to_string();
                let failed_resource = resource.clone();
                request.events().on_complete(priority::EARLY, move |response| {
                    debug!(resource = %resource, status = response.status(), "transport completed");
                });
                request.events().on_error(priority::EARLY, move |failure| {
                    debug!(resource = %failed_resource, error = %failure, "transport failed");
                    ErrorAction::Continue
                });
            }
            HookOutcome::Continue
        });

        for phase in [Phase::Process, Phase::Error] {
            hooks.on(phase, priority::FIRST, move |transaction| {
                start_phase(transaction, phase);
                HookOutcome::Continue
            });
            hooks.on(phase, priority::LAST, move |transaction| {
                finish_phase(transaction, phase);
                if phase == Phase::Process || transaction.result().is_some() {
                    info!(
                        command = transaction.command().name(),
                        took_us = elapsed_us(transaction, context_keys::DEBUG_STARTED_AT),
                        "finished command"
                    );
                }
                HookOutcome::Continue
            });
        }
    }
}
