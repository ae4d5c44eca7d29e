//! Key/value persistence for the activation record and the update cache.
//!
//! Every value lives under one opaque string key and is replaced wholesale on
//! write; the store's single-key atomicity is the only locking there is.
//! Transients are ordinary values wrapped in a `{value, expires_at}` envelope
//! and dropped on first read after expiry.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::StorageConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::site::SiteIdentity;

pub mod secure;

pub use secure::SecureStore;

#[derive(Debug, Serialize, Deserialize)]
struct TransientEnvelope {
    value: String,
    /// Unix seconds.
    expires_at: i64,
}

#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get(&self, key: &str) -> LicenseResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> LicenseResult<()>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> LicenseResult<()>;

    /// Read a transient, deleting it when expired or unreadable.
    async fn get_transient(&self, key: &str) -> LicenseResult<Option<String>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<TransientEnvelope>(&raw) {
            Ok(envelope) if envelope.expires_at > Utc::now().timestamp() => {
                Ok(Some(envelope.value))
            }
            Ok(_) => {
                log::debug!("Transient {} expired", key);
                self.delete(key).await?;
                Ok(None)
            }
            Err(e) => {
                log::debug!("Dropping unreadable transient {}: {}", key, e);
                self.delete(key).await?;
                Ok(None)
            }
        }
    }

    async fn set_transient(&self, key: &str, value: &str, ttl: Duration) -> LicenseResult<()> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let envelope = TransientEnvelope {
            value: value.to_string(),
            expires_at: Utc::now().timestamp().saturating_add(ttl),
        };
        self.set(key, &serde_json::to_string(&envelope)?).await
    }

    async fn delete_transient(&self, key: &str) -> LicenseResult<()> {
        self.delete(key).await
    }
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl OptionStore for MemoryStore {
    async fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> LicenseResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Build the store selected by `storage.backend`.
pub fn from_config(
    config: &StorageConfig,
    site: &SiteIdentity,
) -> LicenseResult<Arc<dyn OptionStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "secure" => Ok(Arc::new(SecureStore::from_config(config, site)?)),
        other => Err(LicenseError::ConfigError(format!(
            "unknown storage backend '{other}'"
        ))),
    }
}
