use sea_orm_migration::{
  prelude::*,
  schema::{boolean, custom, integer, json_binary, text, timestamp_with_time_zone, uuid},
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
          .table(Activity::Table)
          .if_not_exists()
          .col(uuid(Activity::Id).primary_key())
          .col(text(Activity::Name))
          .col(text(Activity::ActivityType))
          .col(text(Activity::Status).default("draft"))
          .col(integer(Activity::Priority).null())
          .col(text(Activity::Context).null())
          .col(uuid(Activity::ParentId).null())
          .col(integer(Activity::Depth).default(0))
          .col(text(Activity::MaterializedPath).default(""))
          .col(uuid(Activity::OwnerEntityId).null())
          .col(uuid(Activity::ClientEntityId).null())
          .col(timestamp_with_time_zone(Activity::StartDate).null())
          .col(timestamp_with_time_zone(Activity::DueDate).null())
          .col(timestamp_with_time_zone(Activity::CompletedAt).null())
          .col(custom(Activity::Tags, "TEXT[] NOT NULL DEFAULT '{}'"))
          .col(boolean(Activity::NeedsReview).default(false))
          .col(text(Activity::ReviewReason).null())
          .col(integer(Activity::ConfirmationCount).default(0))
          .col(json_binary(Activity::Metadata).null())
          .col(custom(Activity::Embedding, "vector(1536)").null())
          .col(timestamp_with_time_zone(Activity::CreatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(Activity::UpdatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(Activity::DeletedAt).null())
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(ActivityClosure::Table)
          .if_not_exists()
          .col(uuid(ActivityClosure::AncestorId))
          .col(uuid(ActivityClosure::DescendantId))
          .col(integer(ActivityClosure::Depth))
          .primary_key(
            Index::create()
              .col(ActivityClosure::AncestorId)
              .col(ActivityClosure::DescendantId),
          )
          .to_owned(),
      )
      .await?;

    for sql in [
      "CREATE INDEX idx_activity_parent ON activity (parent_id) WHERE deleted_at IS NULL;",
      "CREATE INDEX idx_activity_type_status ON activity (activity_type, status) WHERE deleted_at IS NULL;",
      "CREATE INDEX idx_activity_name_trgm ON activity USING gin (name gin_trgm_ops);",
      "CREATE INDEX idx_activity_embedding ON activity USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);",
      "CREATE INDEX idx_activity_closure_descendant ON activity_closure (descendant_id);",
    ] {
      manager
        .get_connection()
        .execute_raw(Statement::from_string(manager.get_database_backend(), sql))
        .await?;
    }

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    for table in [
      Table::drop().table(ActivityClosure::Table).to_owned(),
      Table::drop().table(Activity::Table).to_owned(),
    ] {
      manager.drop_table(table).await?;
    }
    Ok(())
  }
}

#[derive(Iden)]
pub enum Activity {
  Table,
  Id,
  Name,
  ActivityType,
  Status,
  Priority,
  Context,
  ParentId,
  Depth,
  MaterializedPath,
  OwnerEntityId,
  ClientEntityId,
  StartDate,
  DueDate,
  CompletedAt,
  Tags,
  NeedsReview,
  ReviewReason,
  ConfirmationCount,
  Metadata,
  Embedding,
  CreatedAt,
  UpdatedAt,
  DeletedAt,
}

#[derive(Iden)]
pub enum ActivityClosure {
  Table,
  AncestorId,
  DescendantId,
  Depth,
}
