use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityName, EntityTrait, Schema};
use tracing::debug;

use super::entities::{monitor_configs, monitor_executions, staged_resources};

/// Create every table and index derived from the entities; existing ones are
/// left untouched.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    // monitor_executions references monitor_configs
    create_table(db, &schema, monitor_configs::Entity).await?;
    create_table(db, &schema, monitor_executions::Entity).await?;
    create_table(db, &schema, staged_resources::Entity).await?;

    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait + Copy,
{
    let backend = db.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }

    debug!("Ensured table {}", entity.table_name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::establish_connection;
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn test_create_tables_is_idempotent() {
        let db = establish_connection("sqlite::memory:").await.unwrap();
        create_tables(&db).await.unwrap();
        create_tables(&db).await.unwrap();

        let count = staged_resources::Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 0);
    }
}
