//! Lifecycle Engine Tests
//!
//! End-to-end lifecycle behaviour through `ServiceClient::execute` against the
//! mock transport.

use command_core::events::publisher::EventPublisher;
use command_core::prelude::*;
use command_core::state_machine::events::TransactionEvent;
use command_core::state_machine::states::TransactionState;
use command_core::test_utils::{result_from_body, JsonSerializer, MockReply, MockTransport};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use crate::common::{get_item, json_client};

#[tokio::test]
async fn test_get_item_returns_parsed_body() {
    let transport = MockTransport::new();
    transport.push(MockReply::respond(Response::json(
        200,
        json!({"item": "widget"}),
    )));
    let client = json_client(&transport);

    let result = assert_ok!(client.execute_value(get_item(1)).await);

    assert_eq!(result, json!({"item": "widget"}));
    assert_eq!(transport.send_count(), 1);
    let request = &transport.requests()[0];
    assert_eq!(request.method(), "POST");
    assert_eq!(request.resource(), "/GetItem");
    assert_eq!(request.body(), Some(&json!({"id": 1})));
}

#[tokio::test]
async fn test_prepare_intercept_never_sends() {
    let transport = MockTransport::new();
    let client = json_client(&transport);

    let mut command = get_item(1);
    command.on(Phase::Prepare, priority::NORMAL, |_| {
        HookOutcome::intercept(json!({"cached": true}))
    });

    let result = client.execute_value(command).await.unwrap();

    assert_eq!(result, json!({"cached": true}));
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_prepare_set_result_counts_as_intercept() {
    let transport = MockTransport::new();
    let client = json_client(&transport);
    let later = Arc::new(AtomicUsize::new(0));

    let mut command = get_item(1);
    command.on(Phase::Prepare, priority::EARLY, |t| {
        t.set_result(json!("from cache"));
        HookOutcome::Continue
    });
    let counter = later.clone();
    command.on(Phase::Prepare, priority::NORMAL, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        HookOutcome::Continue
    });

    let result = client.execute_value(command).await.unwrap();

    assert_eq!(result, json!("from cache"));
    assert_eq!(later.load(Ordering::SeqCst), 0);
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_intercepted_result_still_runs_process_and_end() {
    let transport = MockTransport::new();
    let client = json_client(&transport);
    let phases = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut command = get_item(1);
    command.on(Phase::Prepare, priority::NORMAL, |_| {
        HookOutcome::intercept(json!(1))
    });
    for phase in [Phase::Process, Phase::End] {
        let seen = phases.clone();
        command.on(phase, priority::LAST, move |_| {
            seen.lock().push(phase);
            HookOutcome::Continue
        });
    }

    client.execute_value(command).await.unwrap();

    assert_eq!(*phases.lock(), vec![Phase::Process, Phase::End]);
}

#[tokio::test]
async fn test_missing_request_is_configuration_error() {
    let transport = MockTransport::new();
    let client = ServiceClient::new(transport.clone());

    let error = assert_err!(client.execute(get_item(1)).await);

    assert_eq!(error.kind(), ErrorKind::Configuration);
    assert!(error.is_configuration_error());
    assert!(error.message().contains("One of the listeners must set a request"));
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_configuration_error_skips_error_hooks() {
    let transport = MockTransport::new();
    let client = ServiceClient::new(transport.clone());
    let error_hooks = Arc::new(AtomicUsize::new(0));

    let mut command = get_item(1);
    let counter = error_hooks.clone();
    command.on(Phase::Error, priority::NORMAL, move |t| {
        counter.fetch_add(1, Ordering::SeqCst);
        t.retry();
        HookOutcome::Continue
    });

    let error = client.execute(command).await.unwrap_err();

    assert!(error.is_configuration_error());
    assert_eq!(error_hooks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_prepare_failure_is_not_rescued_by_error_hooks() {
    let transport = MockTransport::new();
    let client = json_client(&transport);
    let error_hooks = Arc::new(AtomicUsize::new(0));

    let mut command = get_item(1);
    command.on(Phase::Prepare, priority::EARLY, |_| {
        HookOutcome::fail(anyhow::anyhow!("credentials unavailable"))
    });
    let counter = error_hooks.clone();
    command.on(Phase::Error, priority::NORMAL, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        HookOutcome::intercept(json!("rescued"))
    });

    let error = assert_err!(client.execute(command).await);

    assert_eq!(error.kind(), ErrorKind::Command);
    assert!(error.message().contains("credentials unavailable"));
    assert_eq!(error_hooks.load(Ordering::SeqCst), 0);
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_no_content_response_yields_null() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(204));
    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .build()
        .unwrap();

    let result = client.execute_value(get_item(1)).await.unwrap();
    assert_eq!(result, serde_json::Value::Null);
}

#[tokio::test]
async fn test_error_rescued_by_hook() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(404));
    let client = json_client(&transport);

    let mut command = get_item(2);
    command.on(Phase::Error, priority::NORMAL, |t| {
        if t.response().map(Response::status) == Some(404) {
            HookOutcome::intercept(json!({"item": null}))
        } else {
            HookOutcome::Continue
        }
    });

    let result = client.execute_value(command).await.unwrap();
    assert_eq!(result, json!({"item": null}));
}

#[tokio::test]
async fn test_process_failure_routes_through_error_hooks_once() {
    let transport = MockTransport::new();
    transport.push(MockReply::respond(Response::json(200, json!("garbled"))));
    let client = json_client(&transport);
    let error_hooks = Arc::new(AtomicUsize::new(0));

    let mut command = get_item(1);
    command.on(Phase::Process, priority::EARLY, |_| {
        HookOutcome::fail(anyhow::anyhow!("unparseable payload"))
    });
    let counter = error_hooks.clone();
    command.on(Phase::Error, priority::NORMAL, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        HookOutcome::Continue
    });

    let error = client.execute(command).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Command);
    assert!(error.message().contains("unparseable payload"));
    assert_eq!(error.response().map(Response::status), Some(200));
    assert_eq!(error_hooks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_end_hook_sees_final_error() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(500));
    let client = json_client(&transport);
    let seen = Arc::new(parking_lot::Mutex::new(None));

    let mut command = get_item(1);
    let sink = seen.clone();
    command.on(Phase::End, priority::NORMAL, move |t| {
        *sink.lock() = t.error().map(CommandError::kind);
        HookOutcome::Continue
    });

    let error = client.execute(command).await.unwrap_err();

    assert!(error.is_server_error());
    assert_eq!(*seen.lock(), Some(ErrorKind::Server));
}

#[tokio::test]
async fn test_error_carries_transaction_context() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(404));
    let client = json_client(&transport);

    let mut command = get_item(9);
    command.on(Phase::Prepare, priority::FIRST, |t| {
        t.context_mut().insert("trace".to_string(), json!("abc"));
        HookOutcome::Continue
    });

    let error = client.execute(command).await.unwrap_err();

    assert_eq!(error.command().map(Command::name), Some("GetItem"));
    assert_eq!(
        error.command().and_then(|c| c.param("id")),
        Some(&json!(9))
    );
    assert_eq!(error.request().map(Request::resource), Some("/GetItem"));
    assert_eq!(error.context().and_then(|c| c.get("trace")), Some(&json!("abc")));
    assert_eq!(error.attempt(), Some(1));
    assert_eq!(error.client().map(ServiceClient::name), Some("service-client"));
}

#[tokio::test]
async fn test_lifecycle_events_follow_transitions() {
    let transport = MockTransport::new();
    transport.push(MockReply::respond(Response::json(200, json!({}))));
    let publisher = EventPublisher::new(16);
    let mut events = publisher.subscribe();

    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .on(Phase::Process, priority::NORMAL, result_from_body)
        .publisher(publisher)
        .build()
        .unwrap();

    let command = get_item(1);
    let id = command.id();
    client.execute_value(command).await.unwrap();

    let mut transitions = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.command_id, id);
        assert_eq!(event.command, "GetItem");
        transitions.push((event.from, event.event, event.to));
    }

    assert_eq!(
        transitions,
        vec![
            (TransactionState::Prepare, TransactionEvent::Prepared, TransactionState::Sent),
            (TransactionState::Sent, TransactionEvent::Completed, TransactionState::Process),
            (TransactionState::Process, TransactionEvent::Processed, TransactionState::End),
            (TransactionState::End, TransactionEvent::Finished, TransactionState::Exit),
        ]
    );
}

#[tokio::test]
async fn test_client_defaults_merge_into_commands() {
    let transport = MockTransport::new();
    transport.push(MockReply::respond(Response::json(200, json!({}))));
    let mut config = command_core::ClientConfig::default();
    config.defaults.insert("region".to_string(), json!("eu"));
    let client = crate::common::json_client_with(&transport, config);

    let command = client.command(
        "GetItem",
        [("id".to_string(), json!(3))].into_iter().collect(),
    );
    client.execute_value(command).await.unwrap();

    assert_eq!(
        transport.requests()[0].body(),
        Some(&json!({"id": 3, "region": "eu"}))
    );
}
