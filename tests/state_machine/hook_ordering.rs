//! Hook ordering across client and command registrations

use command_core::prelude::*;
use command_core::subscribers::{DebugSubscriber, MockResult, ResultMock};
use command_core::test_utils::{JsonSerializer, MockReply, MockTransport};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use crate::common::get_item;

fn recorder(
    log: &Arc<Mutex<Vec<&'static str>>>,
    label: &'static str,
) -> impl Fn(&mut CommandTransaction) -> HookOutcome + Send + Sync + 'static {
    let log = log.clone();
    move |_| {
        log.lock().push(label);
        HookOutcome::Continue
    }
}

#[tokio::test]
async fn test_priority_bands_then_registration_order() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(200));
    let log = Arc::new(Mutex::new(Vec::new()));

    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .on(Phase::Process, priority::NORMAL, recorder(&log, "client-normal"))
        .on(Phase::Process, priority::LAST, recorder(&log, "client-last"))
        .build()
        .unwrap();

    let mut command = get_item(1);
    command
        .on(Phase::Process, priority::NORMAL, recorder(&log, "command-normal"))
        .on(Phase::Process, priority::FIRST, recorder(&log, "command-first"))
        .on(Phase::Process, priority::EARLY, recorder(&log, "command-early"));

    client.execute(command).await.unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "command-first",
            "command-early",
            "client-normal",
            "command-normal",
            "client-last",
        ]
    );
}

#[tokio::test]
async fn test_intercept_stops_remaining_hooks() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(200));
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .build()
        .unwrap();

    let mut command = get_item(1);
    let first = log.clone();
    command.on(Phase::Process, priority::EARLY, move |_| {
        first.lock().push("early");
        HookOutcome::intercept(json!("early wins"))
    });
    command.on(Phase::Process, priority::NORMAL, recorder(&log, "normal"));

    let result = client.execute_value(command).await.unwrap();

    assert_eq!(result, json!("early wins"));
    assert_eq!(*log.lock(), vec!["early"]);
}

#[tokio::test]
async fn test_user_request_set_before_serializer_wins() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(200));
    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .build()
        .unwrap();

    let mut command = get_item(1);
    command.on(Phase::Prepare, priority::NORMAL, |t| {
        t.set_request(Request::new("GET", "/items/1"));
        HookOutcome::Continue
    });

    client.execute(command).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method(), "GET");
    assert_eq!(requests[0].resource(), "/items/1");
}

#[tokio::test]
async fn test_cloned_command_owns_its_hooks() {
    let transport = MockTransport::new().with_responder(|_| Ok(Response::json(200, json!(0))));
    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .build()
        .unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut original = get_item(1);
    original.on(Phase::End, priority::NORMAL, recorder(&log, "shared"));
    let mut copy = original.clone();
    copy.on(Phase::End, priority::NORMAL, recorder(&log, "copy-only"));

    assert_ne!(original.id(), copy.id());
    assert_eq!(original.hooks().count(Phase::End), 1);
    assert_eq!(copy.hooks().count(Phase::End), 2);

    client.execute(original).await.unwrap();
    assert_eq!(*log.lock(), vec!["shared"]);
}

#[tokio::test]
async fn test_result_mock_subscriber_replays_queue() {
    let transport = MockTransport::new();
    let mock = ResultMock::with_results([
        MockResult::Value(json!({"item": "widget"})),
        MockResult::Message("mocked failure".to_string()),
    ]);
    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .subscribe(&mock)
        .build()
        .unwrap();

    assert_eq!(
        client.execute_value(get_item(1)).await.unwrap(),
        json!({"item": "widget"})
    );
    let error = client.execute(get_item(2)).await.unwrap_err();
    assert!(error.message().contains("mocked failure"));

    let empty = client.execute(get_item(3)).await.unwrap_err();
    assert!(empty.message().contains("Result mock queue is empty"));
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_debug_subscriber_records_phase_timings() {
    let transport = MockTransport::new();
    transport.push(MockReply::respond(Response::json(200, json!({}))));
    let seen = Arc::new(Mutex::new(None));

    let mut command = get_item(1);
    let sink = seen.clone();
    command.on(Phase::End, priority::NORMAL, move |t| {
        *sink.lock() = Some(t.context().clone());
        HookOutcome::Continue
    });

    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .subscribe(&DebugSubscriber::new().with_http(true))
        .build()
        .unwrap();
    client.execute(command).await.unwrap();

    let context = seen.lock().clone().unwrap();
    assert!(context.contains_key(command_core::constants::context_keys::DEBUG_STARTED_AT));
}
