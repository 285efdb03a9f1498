//! Durable Key-Value Storage
//!
//! Provides the platform-agnostic settings store the core uses for everything it
//! keeps across sessions: the queue snapshot, the active platform preference and
//! the per-platform credential markers.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::{BridgeError, Result};

/// Key-value settings storage trait
///
/// Abstracts host-specific durable storage:
/// - Desktop: SQLite-backed table (`bridge-desktop`)
/// - Browser shells: localStorage
/// - Tests: [`MemorySettingsStore`]
///
/// Values are typed. Reading a key with a different type than it was written
/// with is an error, not a silent conversion.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_platform(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("active_platform", "spotify").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings
    async fn clear_all(&self) -> Result<()>;

    /// Retrieve a string value, treating empty strings as absent.
    ///
    /// Credential markers are considered present only when non-empty.
    async fn get_non_empty(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .get_string(key)
            .await?
            .filter(|value| !value.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    String(String),
    Bool(bool),
    I64(i64),
}

impl StoredValue {
    fn type_name(&self) -> &'static str {
        match self {
            StoredValue::String(_) => "string",
            StoredValue::Bool(_) => "bool",
            StoredValue::I64(_) => "i64",
        }
    }
}

/// In-memory settings store
///
/// Non-durable implementation used by tests and development shells. Keys are
/// kept sorted so `list_keys` is deterministic.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<BTreeMap<String, StoredValue>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with string entries
    pub fn with_strings<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(key, value)| (key.into(), StoredValue::String(value.into())))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    fn get_typed(&self, key: &str, expected: &'static str) -> Result<Option<StoredValue>> {
        match self.values.read().get(key) {
            Some(value) if value.type_name() != expected => Err(BridgeError::StorageError(
                format!(
                    "Type mismatch for '{}': expected {}, got {}",
                    key,
                    expected,
                    value.type_name()
                ),
            )),
            Some(value) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), StoredValue::String(value.to_string()));
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.get_typed(key, "string")? {
            Some(StoredValue::String(value)) => Some(value),
            _ => None,
        })
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), StoredValue::Bool(value));
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(match self.get_typed(key, "bool")? {
            Some(StoredValue::Bool(value)) => Some(value),
            _ => None,
        })
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), StoredValue::I64(value));
        Ok(())
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(match self.get_typed(key, "i64")? {
            Some(StoredValue::I64(value)) => Some(value),
            _ => None,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.read().contains_key(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.values.read().keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.values.write().clear();
        Ok(())
    }
}
