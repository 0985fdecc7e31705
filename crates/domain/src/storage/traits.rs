use async_trait::async_trait;
use thiserror::Error;

use crate::model::Network;

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("corrupt store entry `{key}`: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Seed material kept in the embedded key-value store, one sub-bucket per
/// network.
#[async_trait]
pub trait SeedStore: Send + Sync {
    /// Returns `None` when the network has no stored seed.
    async fn load_seed(&self, network: Network) -> StorageResult<Option<String>>;

    /// Writes the seed and records `network` as the current network in one
    /// transaction.
    async fn save_seed(&self, network: Network, seed: &str) -> StorageResult<()>;
}

/// Persistent node configuration held in the store's root bucket.
#[async_trait]
pub trait NodeConfigStore: Send + Sync {
    async fn current_network(&self) -> StorageResult<Option<Network>>;
    async fn set_network(&self, network: Network) -> StorageResult<()>;
}
