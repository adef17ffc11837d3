//! # Client Configuration
//!
//! Read-only configuration of a [`ServiceClient`](crate::client::ServiceClient).
//! Values come from defaults, an optional config file and `COMMAND_CORE_*`
//! environment variables, in increasing order of precedence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::constants::{defaults, env};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Client configuration
///
/// # Examples
///
/// ```rust
/// use command_core::config::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.pool_size, 25);
/// assert!(config.http_errors);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name reported in logs and errors
    pub name: String,
    /// Maximum commands in flight during batch execution
    pub pool_size: usize,
    /// Treat responses with status >= 400 as transport failures
    pub http_errors: bool,
    /// Parameters merged under every command created by the client
    pub defaults: HashMap<String, Value>,
    /// Capacity of the lifecycle event channel
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: defaults::CLIENT_NAME.to_string(),
            pool_size: defaults::POOL_SIZE,
            http_errors: true,
            defaults: HashMap::new(),
            event_channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load a config file; the format follows the file extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading client config from: {}", path.display());
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    /// Optional config file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        debug!("Loaded client configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_channel_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(name) = env_var("NAME") {
            self.name = name;
        }

        if let Some(pool_size) = env_var("POOL_SIZE") {
            self.pool_size = pool_size.parse().map_err(|e| ConfigError::InvalidValue {
                field: "pool_size",
                reason: format!("{e}"),
            })?;
        }

        if let Some(http_errors) = env_var("HTTP_ERRORS") {
            self.http_errors = http_errors.parse().map_err(|e| ConfigError::InvalidValue {
                field: "http_errors",
                reason: format!("{e}"),
            })?;
        }

        if let Some(capacity) = env_var("EVENT_CHANNEL_CAPACITY") {
            self.event_channel_capacity =
                capacity.parse().map_err(|e| ConfigError::InvalidValue {
                    field: "event_channel_capacity",
                    reason: format!("{e}"),
                })?;
        }

        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{}_{key}", env::CONFIG_PREFIX)).ok()
}
