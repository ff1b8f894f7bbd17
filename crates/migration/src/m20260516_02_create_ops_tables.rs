use sea_orm_migration::{
  prelude::*,
  schema::{json_binary, text, timestamp_with_time_zone, uuid},
  sea_orm::Statement,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(JobFailure::Table)
          .if_not_exists()
          .col(uuid(JobFailure::Id).primary_key())
          .col(text(JobFailure::Queue))
          .col(json_binary(JobFailure::Payload))
          .col(text(JobFailure::Error))
          .col(timestamp_with_time_zone(JobFailure::FailedAt).default(Expr::current_timestamp()))
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(DataQualityReport::Table)
          .if_not_exists()
          .col(uuid(DataQualityReport::Id).primary_key())
          .col(json_binary(DataQualityReport::Metrics))
          .col(json_binary(DataQualityReport::Issues))
          .col(json_binary(DataQualityReport::Resolutions))
          .col(
            timestamp_with_time_zone(DataQualityReport::CreatedAt)
              .default(Expr::current_timestamp()),
          )
          .to_owned(),
      )
      .await?;

    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE INDEX idx_job_failure_queue_time ON job_failure (queue, failed_at DESC);",
      ))
      .await?;

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    for table in [
      Table::drop().table(DataQualityReport::Table).to_owned(),
      Table::drop().table(JobFailure::Table).to_owned(),
    ] {
      manager.drop_table(table).await?;
    }
    Ok(())
  }
}

#[derive(Iden)]
pub enum JobFailure {
  Table,
  Id,
  Queue,
  Payload,
  Error,
  FailedAt,
}

#[derive(Iden)]
pub enum DataQualityReport {
  Table,
  Id,
  Metrics,
  Issues,
  Resolutions,
  CreatedAt,
}
