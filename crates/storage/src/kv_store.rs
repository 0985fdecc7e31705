use async_trait::async_trait;
use fleetd_domain::model::Network;
use fleetd_domain::storage::{NodeConfigStore, SeedStore, StorageError, StorageResult};
use sea_orm::{sea_query::OnConflict, ConnectionTrait, EntityTrait, Set, TransactionTrait};
use tracing::debug;

use crate::entity::config_entries;
use crate::SeaOrmStorage;

const ROOT_BUCKET: &str = "config";
const NETWORK_KEY: &str = "network";
const SEED_KEY: &str = "seed";

fn network_bucket(network: Network) -> String {
    format!("{ROOT_BUCKET}/{network}")
}

async fn get_value<C>(conn: &C, bucket: &str, key: &str) -> StorageResult<Option<String>>
where
    C: ConnectionTrait,
{
    let maybe = config_entries::Entity::find_by_id((bucket.to_string(), key.to_string()))
        .one(conn)
        .await
        .map_err(StorageError::from_source)?;
    Ok(maybe.map(|model| model.value))
}

async fn put_value<C>(conn: &C, bucket: &str, key: &str, value: &str) -> StorageResult<()>
where
    C: ConnectionTrait,
{
    let active = config_entries::ActiveModel {
        bucket: Set(bucket.to_string()),
        key: Set(key.to_string()),
        value: Set(value.to_string()),
    };
    config_entries::Entity::insert(active)
        .on_conflict(
            OnConflict::columns([config_entries::Column::Bucket, config_entries::Column::Key])
                .update_column(config_entries::Column::Value)
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}

#[async_trait]
impl SeedStore for SeaOrmStorage {
    async fn load_seed(&self, network: Network) -> StorageResult<Option<String>> {
        get_value(self.connection(), &network_bucket(network), SEED_KEY).await
    }

    async fn save_seed(&self, network: Network, seed: &str) -> StorageResult<()> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(StorageError::from_source)?;
        put_value(&txn, ROOT_BUCKET, NETWORK_KEY, network.as_ref()).await?;
        put_value(&txn, &network_bucket(network), SEED_KEY, seed).await?;
        txn.commit().await.map_err(StorageError::from_source)?;
        debug!(%network, "seed written to store");
        Ok(())
    }
}

#[async_trait]
impl NodeConfigStore for SeaOrmStorage {
    async fn current_network(&self) -> StorageResult<Option<Network>> {
        let Some(raw) = get_value(self.connection(), ROOT_BUCKET, NETWORK_KEY).await? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Network::parse(&raw)
            .map(Some)
            .map_err(|err| StorageError::Corrupt {
                key: format!("{ROOT_BUCKET}/{NETWORK_KEY}"),
                reason: err.to_string(),
            })
    }

    async fn set_network(&self, network: Network) -> StorageResult<()> {
        put_value(self.connection(), ROOT_BUCKET, NETWORK_KEY, network.as_ref()).await
    }
}
