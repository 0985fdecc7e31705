//! SeaORM-backed embedded key-value store behind the domain's seed and
//! node-configuration traits. SQLite is the only backend the daemon ships.

mod builder;
mod entity;
mod kv_store;
mod migration;

use std::sync::Arc;

use fleetd_domain::storage::StorageResult;
use sea_orm::DatabaseConnection;

pub use builder::StorageBuilder;

#[derive(Clone)]
pub struct SeaOrmStorage {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStorage {
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::builder().database_url(database_url).build().await
    }

    /// Private SQLite database pinned to a single pooled connection, so every
    /// query sees the same in-memory schema.
    pub async fn in_memory() -> StorageResult<Self> {
        Self::builder()
            .database_url("sqlite::memory:")
            .max_connections(1)
            .build()
            .await
    }

    pub(crate) fn from_connection(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub(crate) fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}
