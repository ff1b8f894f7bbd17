use sea_orm_migration::{
  prelude::*,
  schema::{custom, json_binary, text, timestamp_with_time_zone, uuid},
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
          .table(PendingEntityResolution::Table)
          .if_not_exists()
          .col(uuid(PendingEntityResolution::Id).primary_key())
          .col(text(PendingEntityResolution::IdentifierType))
          .col(text(PendingEntityResolution::IdentifierValue))
          .col(text(PendingEntityResolution::DisplayName).null())
          .col(text(PendingEntityResolution::Status).default("pending"))
          .col(uuid(PendingEntityResolution::ResolvedEntityId).null())
          .col(text(PendingEntityResolution::Resolution).null())
          .col(json_binary(PendingEntityResolution::Suggestions).null())
          .col(custom(PendingEntityResolution::SampleMessageIds, "UUID[] NOT NULL DEFAULT '{}'"))
          .col(
            timestamp_with_time_zone(PendingEntityResolution::FirstSeenAt)
              .default(Expr::current_timestamp()),
          )
          .col(timestamp_with_time_zone(PendingEntityResolution::ResolvedAt).null())
          .to_owned(),
      )
      .await?;

    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE UNIQUE INDEX idx_pending_resolution_key ON pending_entity_resolution (identifier_type, identifier_value);",
      ))
      .await?;

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PendingEntityResolution::Table).to_owned())
      .await
  }
}

#[derive(Iden)]
pub enum PendingEntityResolution {
  Table,
  Id,
  IdentifierType,
  IdentifierValue,
  DisplayName,
  Status,
  ResolvedEntityId,
  Resolution,
  Suggestions,
  SampleMessageIds,
  FirstSeenAt,
  ResolvedAt,
}
