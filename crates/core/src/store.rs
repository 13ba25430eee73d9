use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("value at `{key}` is not a counter")]
    NotACounter { key: String },
}

/// Minimal key-value contract for process state (quest counters and
/// completion markers). The default implementation is in-memory and dies
/// with the process; swapping in a durable backend must not touch call
/// sites, so everything runtime-stateful goes through this trait.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
    /// Atomic read-modify-write. Missing keys start at 0.
    async fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError>;
    /// Set the key only if absent. Returns true when this call claimed it.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError>;
}

/// Process-memory store. Counters and markers reset on restart, an
/// accepted tradeoff, quest progress is explicitly non-durable.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Unavailable("store lock poisoned".to_owned()))
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut entries = self.lock()?;
        let current = match entries.get(key) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::NotACounter { key: key.to_owned() })?,
            None => 0,
        };
        let next = current + by;
        entries.insert(key.to_owned(), next.to_string());
        Ok(next)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.lock()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_owned(), value.to_owned());
        Ok(true)
    }
}
