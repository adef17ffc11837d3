//! Result model wrapper with path lookups.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command result value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model(Value);

impl Model {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a top-level field is present and not null
    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| !value.is_null())
    }

    /// Nested lookup with a slash-separated path such as `items/0/name`
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.0, path)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Model {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Slash-separated lookup into objects and arrays; an empty path is the root
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
