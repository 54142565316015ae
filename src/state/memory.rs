//! In-memory state backend

use crate::error::{DockhandError, DockhandResult};
use crate::state::StateStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// State store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a value
    pub fn with(self, key: &str, value: &str) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Copy of all current values
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values
            .lock()
            .map(|values| values.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> DockhandResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| DockhandError::State("state lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DockhandResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| DockhandError::State("state lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> DockhandResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| DockhandError::State("state lock poisoned".to_string()))?;
        values.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
