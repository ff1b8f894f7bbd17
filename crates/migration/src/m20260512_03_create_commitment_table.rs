use sea_orm_migration::{
  prelude::*,
  schema::{boolean, custom, double, integer, json_binary, text, timestamp_with_time_zone, uuid},
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
          .table(Commitment::Table)
          .if_not_exists()
          .col(uuid(Commitment::Id).primary_key())
          .col(text(Commitment::CommitmentType))
          .col(text(Commitment::Title))
          .col(text(Commitment::Description).null())
          .col(text(Commitment::Status).default("draft"))
          .col(uuid(Commitment::FromEntityId).null())
          .col(uuid(Commitment::ToEntityId).null())
          .col(text(Commitment::ToDisplayName).null())
          .col(uuid(Commitment::ActivityId).null())
          .col(uuid(Commitment::SourceMessageId).null())
          .col(uuid(Commitment::SourceInteractionId).null())
          .col(timestamp_with_time_zone(Commitment::DueDate).null())
          .col(text(Commitment::RecurrenceRule).null())
          .col(timestamp_with_time_zone(Commitment::NextReminderAt).null())
          .col(integer(Commitment::ReminderCount).default(0))
          .col(double(Commitment::Confidence).default(1.0))
          .col(boolean(Commitment::NeedsReview).default(false))
          .col(text(Commitment::ReviewReason).null())
          .col(integer(Commitment::ConfirmationCount).default(0))
          .col(json_binary(Commitment::Metadata).null())
          .col(custom(Commitment::Embedding, "vector(1536)").null())
          .col(timestamp_with_time_zone(Commitment::CreatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(Commitment::UpdatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(Commitment::DeletedAt).null())
          .to_owned(),
      )
      .await?;

    for sql in [
      // Minute scan: due reminders among live commitments.
      "CREATE INDEX idx_commitment_reminder ON commitment (next_reminder_at) WHERE deleted_at IS NULL AND next_reminder_at IS NOT NULL;",
      "CREATE INDEX idx_commitment_overdue ON commitment (due_date) WHERE deleted_at IS NULL AND status IN ('pending', 'in_progress');",
      "CREATE INDEX idx_commitment_embedding ON commitment USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);",
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
      .drop_table(Table::drop().table(Commitment::Table).to_owned())
      .await
  }
}

#[derive(Iden)]
pub enum Commitment {
  Table,
  Id,
  CommitmentType,
  Title,
  Description,
  Status,
  FromEntityId,
  ToEntityId,
  ToDisplayName,
  ActivityId,
  SourceMessageId,
  SourceInteractionId,
  DueDate,
  RecurrenceRule,
  NextReminderAt,
  ReminderCount,
  Confidence,
  NeedsReview,
  ReviewReason,
  ConfirmationCount,
  Metadata,
  Embedding,
  CreatedAt,
  UpdatedAt,
  DeletedAt,
}
