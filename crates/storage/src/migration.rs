use sea_orm::sea_query::{ColumnDef, Index, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use crate::entity::config_entries;
use fleetd_domain::storage::{StorageError, StorageResult};

pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let entries_table = Table::create()
        .if_not_exists()
        .table(config_entries::Entity)
        .col(
            ColumnDef::new(config_entries::Column::Bucket)
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new(config_entries::Column::Key)
                .string_len(64)
                .not_null(),
        )
        .col(ColumnDef::new(config_entries::Column::Value).text().not_null())
        .primary_key(
            Index::create()
                .col(config_entries::Column::Bucket)
                .col(config_entries::Column::Key),
        )
        .to_owned();
    create_table(db, backend, entries_table).await?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
