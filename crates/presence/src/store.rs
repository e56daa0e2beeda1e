//! Cache and settings seams
//!
//! The presence core only reads. Both collaborators are external; the
//! implementations here back the CLI and the tests.

use crate::error::PresenceError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Key prefix the heartbeat producer writes under.
pub const DEFAULT_CACHE_PREFIX: &str = "ALIVE_IP_USER_";

/// Name of the counting-mode setting.
pub const DEVICE_LIMIT_MODE_KEY: &str = "device_limit_mode";

/// Read-only view of the shared presence cache.
#[async_trait]
pub trait PresenceCache: Send + Sync {
    /// Point lookup. A miss is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Value>, PresenceError>;

    /// One batched lookup for all keys. Missing keys may be omitted or
    /// mapped to `Value::Null`.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>, PresenceError>;
}

/// Source of the integer counting-mode setting.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Raw `device_limit_mode`; `None` when unset.
    async fn device_limit_mode(&self) -> Result<Option<i64>, PresenceError>;
}

/// Compose the cache key for a user.
pub fn cache_key(prefix: &str, user_id: i64) -> String {
    format!("{}{}", prefix, user_id)
}

/// In-process presence cache
#[derive(Default)]
pub struct MemoryPresenceCache {
    entries: Arc<RwLock<HashMap<String, Value>>>,
    /// Lookups served, point and batched alike
    round_trips: AtomicUsize,
}

impl MemoryPresenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a JSON object mapping full cache keys to stored values.
    pub fn from_json_file(path: &Path) -> Result<Self, PresenceError> {
        let content = std::fs::read_to_string(path)?;
        let entries: HashMap<String, Value> = serde_json::from_str(&content)?;
        debug!(path = %path.display(), keys = entries.len(), "seeded presence cache");
        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            round_trips: AtomicUsize::new(0),
        })
    }

    /// Store a raw value. Test and seeding helper; the presence core never writes.
    pub async fn insert(&self, key: impl Into<String>, value: Value) {
        self.entries.write().await.insert(key.into(), value);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PresenceCache for MemoryPresenceCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, PresenceError> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>, PresenceError> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }
}

/// Settings fixed at startup, typically from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    device_limit_mode: Option<i64>,
}

impl StaticSettings {
    pub fn new(device_limit_mode: Option<i64>) -> Self {
        Self { device_limit_mode }
    }
}

#[async_trait]
impl SettingsStore for StaticSettings {
    async fn device_limit_mode(&self) -> Result<Option<i64>, PresenceError> {
        Ok(self.device_limit_mode)
    }
}
