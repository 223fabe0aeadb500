//! Persisted key-value storage behind the match cache.
//!
//! Values are JSON documents stored as strings so a corrupt value can be read
//! back and recognized as corrupt instead of failing inside the backend.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The storage trait. `MemoryStore` backs tests and single-process runs,
/// `RedisStore` backs deployments that share a cache across restarts.
#[async_trait]
pub trait PersistedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Every stored key starting with `prefix`, in no particular order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
