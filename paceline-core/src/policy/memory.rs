use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use paceline_contracts::store::{SettingsStore, StoreEntries, StoreError};
use serde_json::Value;
use tokio::sync::RwLock;

/// Process-local settings store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<StoreEntries>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a JSON object; anything else starts empty.
    pub fn with_entries(initial: Value) -> Self {
        let entries = match initial {
            Value::Object(map) => map,
            _ => StoreEntries::new(),
        };
        Self {
            entries: RwLock::new(entries),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn dump(&self) -> Value {
        Value::Object(self.entries.read().await.clone())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<StoreEntries, StoreError> {
        self.check_available()?;
        let guard = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                guard.get(*key).map(|value| (key.to_string(), value.clone()))
            })
            .collect())
    }

    async fn set(&self, entries: StoreEntries) -> Result<(), StoreError> {
        self.check_available()?;
        let mut guard = self.entries.write().await;
        for (key, value) in entries {
            guard.insert(key, value);
        }
        Ok(())
    }
}
