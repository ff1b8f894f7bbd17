use sea_orm_migration::{prelude::*, sea_orm::Statement};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    for sql in [
      "CREATE EXTENSION IF NOT EXISTS vector;",
      "CREATE EXTENSION IF NOT EXISTS pg_trgm;",
    ] {
      manager
        .get_connection()
        .execute_raw(Statement::from_string(manager.get_database_backend(), sql))
        .await?;
    }
    Ok(())
  }

  async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
    // Extensions may be shared with other schemas; leave them installed.
    Ok(())
  }
}
