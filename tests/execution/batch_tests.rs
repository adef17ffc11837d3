//! Batch execution tests

use command_core::prelude::*;
use command_core::test_utils::MockTransport;
use command_core::ClientConfig;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{get_item, json_client, json_client_with};

/// Even ids succeed, odd ids answer 404
fn even_odd_transport() -> MockTransport {
    MockTransport::new().with_responder(|request| {
        let id = request
            .body()
            .and_then(|body| body.get("id"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or_default();
        if id % 2 == 0 {
            Ok(Response::json(200, json!({"id": id})))
        } else {
            Ok(Response::new(404))
        }
    })
}

#[tokio::test]
async fn test_mixed_batch_collects_every_outcome() {
    let transport = even_odd_transport();
    let client = json_client(&transport);
    let fulfilled = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let commands: Vec<Command> = (0..10).map(get_item).collect();
    let ids: Vec<CommandId> = commands.iter().map(Command::id).collect();

    let on_fulfilled = fulfilled.clone();
    let on_rejected = rejected.clone();
    let options = BatchOptions::new()
        .pool_size(3)
        .on_fulfilled(move |_, _| {
            on_fulfilled.fetch_add(1, Ordering::SeqCst);
        })
        .on_rejected(move |_, error| {
            assert!(error.is_client_error());
            on_rejected.fetch_add(1, Ordering::SeqCst);
        });

    let results = client.execute_all(commands, options).await;

    assert_eq!(results.len(), 10);
    assert_eq!(results.fulfilled_count(), 5);
    assert_eq!(results.rejected_count(), 5);
    assert_eq!(
        fulfilled.load(Ordering::SeqCst) + rejected.load(Ordering::SeqCst),
        10
    );

    for (index, id) in ids.iter().enumerate() {
        match results.get(id).unwrap() {
            Ok(value) => assert_eq!(value, &json!({"id": index})),
            Err(error) => {
                assert_eq!(index % 2, 1);
                assert_eq!(error.response().map(Response::status), Some(404));
            }
        }
    }

    let ordered: Vec<CommandId> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ordered, ids);
}

#[tokio::test]
async fn test_pool_size_bounds_in_flight_requests() {
    let transport = MockTransport::new()
        .with_responder(|_| Ok(Response::json(200, json!(true))))
        .with_latency(Duration::from_millis(20));
    let client = json_client(&transport);

    let commands: Vec<Command> = (0..12).map(get_item).collect();
    let results = client
        .execute_all(commands, BatchOptions::new().pool_size(4))
        .await;

    assert_eq!(results.fulfilled_count(), 12);
    assert!(transport.max_in_flight() <= 4);
    assert!(transport.max_in_flight() >= 1);
    assert_eq!(transport.send_count(), 12);
}

#[tokio::test]
async fn test_configured_pool_size_is_default() {
    let transport = MockTransport::new()
        .with_responder(|_| Ok(Response::json(200, json!(true))))
        .with_latency(Duration::from_millis(10));
    let config = ClientConfig {
        pool_size: 2,
        ..ClientConfig::default()
    };
    let client = json_client_with(&transport, config);

    let commands: Vec<Command> = (0..6).map(get_item).collect();
    let results = client.execute_all(commands, BatchOptions::new()).await;

    assert_eq!(results.len(), 6);
    assert!(transport.max_in_flight() <= 2);
}

#[tokio::test]
async fn test_batch_never_raises_configuration_errors() {
    let transport = MockTransport::new();
    // No serializer: every command fails in prepare
    let client = ServiceClient::new(transport.clone());

    let commands: Vec<Command> = (0..3).map(get_item).collect();
    let results = client.execute_all(commands, BatchOptions::new()).await;

    assert_eq!(results.rejected_count(), 3);
    assert!(results
        .failures()
        .all(|(_, error)| error.is_configuration_error()));
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_rescued_commands_count_as_fulfilled() {
    let transport = even_odd_transport();
    let client = json_client(&transport);

    let mut rescued = get_item(1);
    rescued.on(Phase::Error, priority::NORMAL, |_| {
        HookOutcome::intercept(json!("fallback"))
    });
    let rescued_id = rescued.id();

    let results = client
        .execute_all(vec![rescued, get_item(3)], BatchOptions::new())
        .await;

    assert_eq!(results.get(&rescued_id).unwrap().as_ref().unwrap(), &json!("fallback"));
    assert_eq!(results.fulfilled_count(), 1);
    assert_eq!(results.rejected_count(), 1);
}

#[tokio::test]
async fn test_future_commands_are_forced_in_batches() {
    let transport = even_odd_transport();
    let client = json_client(&transport);

    let commands = vec![get_item(2).with_future(true), get_item(5).with_future(true)];
    let results = client.execute_all(commands, BatchOptions::new()).await;

    assert_eq!(results.fulfilled_count(), 1);
    assert_eq!(results.rejected_count(), 1);
    assert!(results
        .successes()
        .all(|(_, value)| value == &json!({"id": 2})));
}

#[tokio::test]
async fn test_empty_batch() {
    let transport = MockTransport::new();
    let client = json_client(&transport);

    let results = client.execute_all(Vec::new(), BatchOptions::new()).await;
    assert!(results.is_empty());
}
