use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FlowError, Result};

/// Context for sharing data between stages of a pipeline run.
///
/// Cloning is cheap: all clones see the same underlying map, so a stage
/// can mutate state that a later stage (or the HTTP layer, between steps)
/// reads back.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let value = serde_json::to_value(value).expect("Failed to serialize value");
        self.data.insert(key.into(), value);
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Like `get`, but a missing or malformed entry is an error the stage
    /// can propagate instead of silently defaulting.
    pub async fn get_required<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)
            .await
            .ok_or_else(|| FlowError::ContextError(format!("'{key}' not found in context")))
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    /// Dump the context to a plain map for persistence.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Rebuild a context from a persisted snapshot.
    pub fn restore(snapshot: HashMap<String, Value>) -> Self {
        let data = DashMap::new();
        for (k, v) in snapshot {
            data.insert(k, v);
        }
        Self {
            data: Arc::new(data),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
