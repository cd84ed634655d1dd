//! In-process store

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{PersistentStore, StoreResult};

/// Store backed by a map in memory; contents die with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one value already set
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.values.lock().insert(key.to_string(), value.to_string());
        store
    }
}

impl PersistentStore for MemoryStore {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
