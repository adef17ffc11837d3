//! Typed errors produced by transport outcomes

use command_core::execution::error_classifier::{ErrorClassifier, Failure, StandardErrorClassifier};
use command_core::execution::request_events::ErrorAction;
use command_core::prelude::*;
use command_core::test_utils::{JsonSerializer, MockReply, MockTransport};
use command_core::ClientConfig;
use serde_json::json;

use crate::common::{get_item, json_client, json_client_with};

#[tokio::test]
async fn test_not_found_is_client_error() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(404));
    let client = json_client(&transport);

    let error = client.execute(get_item(2)).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Client);
    assert_eq!(error.response().map(Response::status), Some(404));
    assert_eq!(
        error.to_string(),
        "Error executing command (client error response): \
         Client error response [resource] /GetItem [status code] 404"
    );
}

#[tokio::test]
async fn test_service_unavailable_is_server_error() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(503));
    let client = json_client(&transport);

    let error = client.execute(get_item(1)).await.unwrap_err();

    assert!(error.is_server_error());
    assert_eq!(error.response().map(Response::status), Some(503));
}

#[tokio::test]
async fn test_failure_without_response_is_base_error() {
    let transport = MockTransport::new();
    transport.push(MockReply::fail(TransportFailure::new("connection refused")));
    let client = json_client(&transport);

    let error = client.execute(get_item(1)).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Command);
    assert!(error.response().is_none());
    assert_eq!(error.message(), "connection refused");
    assert!(std::error::Error::source(&error).is_some());
}

#[tokio::test]
async fn test_failure_carrying_response_uses_its_status() {
    let transport = MockTransport::new();
    transport.push(MockReply::fail(
        TransportFailure::new("throttled").with_response(Response::new(429)),
    ));
    let client = json_client(&transport);

    let error = client.execute(get_item(1)).await.unwrap_err();
    assert!(error.is_client_error());
    assert_eq!(error.message(), "throttled");
}

#[tokio::test]
async fn test_http_errors_disabled_passes_status_to_process() {
    let transport = MockTransport::new();
    transport.push(MockReply::respond(Response::json(404, json!({"missing": true}))));
    let config = ClientConfig {
        http_errors: false,
        ..ClientConfig::default()
    };
    let client = json_client_with(&transport, config);

    let result = client.execute_value(get_item(1)).await.unwrap();
    assert_eq!(result, json!({"missing": true}));
}

#[tokio::test]
async fn test_transport_listener_recovers_failure() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(500));
    let client = json_client(&transport);

    let mut command = get_item(1);
    command.on(Phase::Prepare, priority::LAST, |t| {
        if let Some(request) = t.request() {
            request.events().on_error(priority::NORMAL, |_| {
                ErrorAction::Recover(Response::json(200, json!("recovered")))
            });
        }
        HookOutcome::Continue
    });

    let result = client.execute_value(command).await.unwrap();
    assert_eq!(result, json!("recovered"));
}

#[tokio::test]
async fn test_suppressed_transport_failure_is_disconnected() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(500));
    let client = json_client(&transport);

    let mut command = get_item(1);
    command.on(Phase::Prepare, priority::LAST, |t| {
        if let Some(request) = t.request() {
            request
                .events()
                .on_error(priority::NORMAL, |_| ErrorAction::StopPropagation);
        }
        HookOutcome::Continue
    });

    let error = client.execute(command).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Command);
    assert!(error.response().is_none());
}

struct EverythingIsServer;

impl ErrorClassifier for EverythingIsServer {
    fn classify(&self, failure: Failure, transaction: &CommandTransaction) -> CommandError {
        let base = StandardErrorClassifier::new().classify(failure, transaction);
        match base.details() {
            Some(details) => CommandError::new(ErrorKind::Server, details.clone()),
            None => base,
        }
    }
}

#[tokio::test]
async fn test_custom_classifier() {
    let transport = MockTransport::new();
    transport.push(MockReply::status(404));
    let client = ServiceClient::builder(transport.clone())
        .serializer(JsonSerializer)
        .classifier(EverythingIsServer)
        .build()
        .unwrap();

    let error = client.execute(get_item(1)).await.unwrap_err();
    assert!(error.is_server_error());
    assert!(format!("{client:?}").contains("custom"));
}
