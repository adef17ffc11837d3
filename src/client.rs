//! # Service Client
//!
//! The façade SDK code embeds: it owns the transport, the read-only
//! configuration, the error classifier and the client-wide hooks, creates
//! commands and hands them to the lifecycle engine.
//!
//! ```rust,no_run
//! use command_core::client::ServiceClient;
//! use command_core::execution::transport::Request;
//! use command_core::state_machine::transaction::CommandTransaction;
//! use command_core::test_utils::MockTransport;
//! use std::collections::HashMap;
//!
//! # async fn run() -> command_core::error::Result<()> {
//! let client = ServiceClient::builder(MockTransport::new())
//!     .serializer(|transaction: &CommandTransaction| -> anyhow::Result<Request> {
//!         Ok(Request::new("GET", format!("/{}", transaction.command().name())))
//!     })
//!     .build()
//!     .expect("valid configuration");
//!
//! let command = client.command("ListItems", HashMap::new());
//! let items = client.execute_value(command).await?;
//! println!("{items}");
//! # Ok(())
//! # }
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{ClientConfig, ConfigError};
use crate::constants::priority;
use crate::error::Result;
use crate::events::publisher::EventPublisher;
use crate::execution::batch_executor::{BatchExecutor, BatchOptions, BatchResults};
use crate::execution::command::Command;
use crate::execution::error_classifier::{ErrorClassifier, StandardErrorClassifier};
use crate::execution::future_result::CommandOutput;
use crate::execution::transport::{Request, Transport};
use crate::model::{lookup_path, Model};
use crate::state_machine::hooks::{HookOutcome, HookRegistry, Phase, Subscriber};
use crate::state_machine::lifecycle_engine::LifecycleEngine;
use crate::state_machine::transaction::CommandTransaction;

/// Wire-format collaborator turning a transaction into a request
pub trait RequestSerializer: Send + Sync {
    fn serialize(&self, transaction: &CommandTransaction) -> anyhow::Result<Request>;
}

impl<F> RequestSerializer for F
where
    F: Fn(&CommandTransaction) -> anyhow::Result<Request> + Send + Sync,
{
    fn serialize(&self, transaction: &CommandTransaction) -> anyhow::Result<Request> {
        self(transaction)
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    config_tree: Value,
    classifier: Arc<dyn ErrorClassifier>,
    hooks: HookRegistry,
    publisher: Option<EventPublisher>,
}

/// Cheaply clonable handle to a configured client
#[derive(Clone)]
pub struct ServiceClient {
    inner: Arc<ClientInner>,
}

impl ServiceClient {
    pub fn builder(transport: impl Transport) -> ServiceClientBuilder {
        ServiceClientBuilder::new(Arc::new(transport))
    }

    /// Client with default configuration and no hooks
    pub fn new(transport: impl Transport) -> Self {
        let config = ClientConfig::default();
        let config_tree = serde_json::to_value(&config).unwrap_or_default();
        Self {
            inner: Arc::new(ClientInner {
                transport: Arc::new(transport),
                config,
                config_tree,
                classifier: Arc::new(StandardErrorClassifier::new()),
                hooks: HookRegistry::new(),
                publisher: None,
            }),
        }
    }

    /// Create a command; configured defaults are merged under `params`
    pub fn command(&self, name: impl Into<String>, params: HashMap<String, Value>) -> Command {
        let mut merged = self.inner.config.defaults.clone();
        merged.extend(params);
        Command::new(name, merged)
    }

    pub fn engine(&self) -> LifecycleEngine {
        LifecycleEngine::new(self.clone())
    }

    pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
        self.engine().execute(Arc::new(command)).await
    }

    /// Execute and force a deferred output
    pub async fn execute_value(&self, command: Command) -> Result<Value> {
        self.execute(command).await?.into_value().await
    }

    /// Execute and wrap the forced result for path lookups
    pub async fn execute_model(&self, command: Command) -> Result<Model> {
        self.execute_value(command).await.map(Model::from)
    }

    /// Execute many commands with bounded concurrency; never fails as a whole
    pub async fn execute_all(&self, commands: Vec<Command>, options: BatchOptions) -> BatchResults {
        BatchExecutor::new(self.clone()).execute_all(commands, options).await
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Slash-path lookup into the configuration, e.g. `defaults/region`
    pub fn config_value(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.inner.config_tree, path)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn classifier(&self) -> &dyn ErrorClassifier {
        self.inner.classifier.as_ref()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    pub fn publisher(&self) -> Option<&EventPublisher> {
        self.inner.publisher.as_ref()
    }
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("name", &self.inner.config.name)
            .field("config", &self.inner.config)
            .field("classifier", &self.inner.classifier.classifier_name())
            .field("hooks", &self.inner.hooks)
            .field("publisher", &self.inner.publisher.is_some())
            .finish()
    }
}

/// Builder for [`ServiceClient`]
pub struct ServiceClientBuilder {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    classifier: Arc<dyn ErrorClassifier>,
    hooks: HookRegistry,
    publisher: Option<EventPublisher>,
    publish_events: bool,
}

impl ServiceClientBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
            classifier: Arc::new(StandardErrorClassifier::new()),
            hooks: HookRegistry::new(),
            publisher: None,
            publish_events: false,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Install a serializer as a `LATE` prepare hook; it only runs when no request is set yet
    pub fn serializer(mut self, serializer: impl RequestSerializer + 'static) -> Self {
        let serializer = Arc::new(serializer);
        self.hooks.on(Phase::Prepare, priority::LATE, move |transaction| {
            if transaction.request().is_some() {
                return HookOutcome::Continue;
            }
            match serializer.serialize(transaction) {
                Ok(request) => {
                    transaction.set_request(request);
                    HookOutcome::Continue
                }
                Err(error) => HookOutcome::Fail(error),
            }
        });
        self
    }

    /// Client-wide hook applied to every command
    pub fn on<F>(mut self, phase: Phase, priority: i32, hook: F) -> Self
    where
        F: Fn(&mut CommandTransaction) -> HookOutcome + Send + Sync + 'static,
    {
        self.hooks.on(phase, priority, hook);
        self
    }

    pub fn subscribe(mut self, subscriber: &dyn Subscriber) -> Self {
        subscriber.register(&mut self.hooks);
        self
    }

    /// Publish lifecycle events on an existing publisher
    pub fn publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Publish lifecycle events on a new publisher sized by the configuration
    pub fn with_event_publisher(mut self) -> Self {
        self.publish_events = true;
        self
    }

    pub fn build(self) -> std::result::Result<ServiceClient, ConfigError> {
        self.config.validate()?;
        let config_tree = serde_json::to_value(&self.config)?;
        let publisher = match self.publisher {
            Some(publisher) => Some(publisher),
            None if self.publish_events => {
                Some(EventPublisher::new(self.config.event_channel_capacity))
            }
            None => None,
        };

        Ok(ServiceClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                config: self.config,
                config_tree,
                classifier: self.classifier,
                hooks: self.hooks,
                publisher,
            }),
        })
    }
}
