use fleetd_domain::storage::{StorageError, StorageResult};
use sea_orm::{ConnectOptions, Database};
use tracing::debug;

use crate::{migration::run_migrations, SeaOrmStorage};

#[derive(Debug, Default)]
pub struct StorageBuilder {
    database_url: Option<String>,
    max_connections: Option<u32>,
    sqlx_logging: bool,
}

impl StorageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn max_connections(mut self, limit: u32) -> Self {
        self.max_connections = Some(limit.max(1));
        self
    }

    /// Forwards every SQL statement to `tracing` at debug level.
    pub fn sqlx_logging(mut self, enabled: bool) -> Self {
        self.sqlx_logging = enabled;
        self
    }

    pub async fn build(self) -> StorageResult<SeaOrmStorage> {
        let url = self
            .database_url
            .ok_or_else(|| StorageError::Database("missing database url".into()))?;
        let mut options = ConnectOptions::new(url.clone());
        options.sqlx_logging(self.sqlx_logging);
        if let Some(limit) = self.max_connections {
            options.max_connections(limit);
        }
        let db = Database::connect(options)
            .await
            .map_err(StorageError::from_source)?;
        run_migrations(&db).await?;
        debug!(%url, "config store ready");
        Ok(SeaOrmStorage::from_connection(db))
    }
}
