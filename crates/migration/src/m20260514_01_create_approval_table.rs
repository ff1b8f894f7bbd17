use sea_orm_migration::{
  prelude::*,
  schema::{double, text, timestamp_with_time_zone, uuid},
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
          .table(PendingApproval::Table)
          .if_not_exists()
          .col(uuid(PendingApproval::Id).primary_key())
          .col(text(PendingApproval::ItemType))
          .col(uuid(PendingApproval::TargetId))
          .col(uuid(PendingApproval::BatchId))
          .col(text(PendingApproval::Status).default("pending"))
          .col(double(PendingApproval::Confidence).default(0.0))
          .col(text(PendingApproval::SourceQuote).null())
          .col(uuid(PendingApproval::SourceInteractionId).null())
          .col(uuid(PendingApproval::SourceEntityId).null())
          .col(text(PendingApproval::Context).null())
          .col(
            timestamp_with_time_zone(PendingApproval::CreatedAt)
              .default(Expr::current_timestamp()),
          )
          .col(timestamp_with_time_zone(PendingApproval::ReviewedAt).null())
          .to_owned(),
      )
      .await?;

    for sql in [
      // One live approval per draft.
      "CREATE UNIQUE INDEX idx_approval_target ON pending_approval (item_type, target_id) WHERE status = 'pending';",
      "CREATE INDEX idx_approval_batch ON pending_approval (batch_id, status);",
      "CREATE INDEX idx_approval_gc ON pending_approval (reviewed_at) WHERE status = 'rejected';",
    ] {
      manager
        .get_connection()
        .execute_raw(Statement::from_string(manager.get_database_backend(), sql))
        .await?;
    }

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PendingApproval::Table).to_owned())
      .await
  }
}

#[derive(Iden)]
pub enum PendingApproval {
  Table,
  Id,
  ItemType,
  TargetId,
  BatchId,
  Status,
  Confidence,
  SourceQuote,
  SourceInteractionId,
  SourceEntityId,
  Context,
  CreatedAt,
  ReviewedAt,
}
