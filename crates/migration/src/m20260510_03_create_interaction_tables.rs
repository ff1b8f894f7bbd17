use sea_orm_migration::{
  prelude::*,
  schema::{boolean, custom, json_binary, text, timestamp_with_time_zone, uuid},
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
          .table(Interaction::Table)
          .if_not_exists()
          .col(uuid(Interaction::Id).primary_key())
          .col(text(Interaction::InteractionType))
          .col(text(Interaction::Source))
          .col(text(Interaction::ChatId))
          .col(text(Interaction::TopicId).null())
          .col(text(Interaction::Status).default("active"))
          .col(timestamp_with_time_zone(Interaction::StartedAt))
          .col(timestamp_with_time_zone(Interaction::EndedAt).null())
          .col(timestamp_with_time_zone(Interaction::LastMessageAt))
          .col(json_binary(Interaction::SourceMetadata).null())
          .col(boolean(Interaction::NeedsResegmentation).default(false))
          .col(timestamp_with_time_zone(Interaction::SegmentedAt).null())
          .col(timestamp_with_time_zone(Interaction::CreatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(Interaction::UpdatedAt).default(Expr::current_timestamp()))
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(InteractionParticipant::Table)
          .if_not_exists()
          .col(uuid(InteractionParticipant::Id).primary_key())
          .col(uuid(InteractionParticipant::InteractionId))
          .col(uuid(InteractionParticipant::EntityId).null())
          .col(text(InteractionParticipant::Role))
          .col(text(InteractionParticipant::IdentifierType))
          .col(text(InteractionParticipant::IdentifierValue))
          .col(text(InteractionParticipant::DisplayName).null())
          .col(
            timestamp_with_time_zone(InteractionParticipant::CreatedAt)
              .default(Expr::current_timestamp()),
          )
          .foreign_key(
            ForeignKey::create()
              .from(InteractionParticipant::Table, InteractionParticipant::InteractionId)
              .to(Interaction::Table, Interaction::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(Message::Table)
          .if_not_exists()
          .col(uuid(Message::Id).primary_key())
          .col(uuid(Message::InteractionId))
          .col(uuid(Message::SenderEntityId).null())
          .col(uuid(Message::RecipientEntityId).null())
          .col(text(Message::SenderIdentifierType))
          .col(text(Message::SenderIdentifierValue))
          .col(text(Message::Content))
          .col(boolean(Message::IsOutgoing).default(false))
          .col(timestamp_with_time_zone(Message::Timestamp))
          .col(text(Message::SourceMessageId).null())
          .col(text(Message::ReplyToMessageId).null())
          .col(text(Message::MediaType).null())
          .col(text(Message::ChatType).null())
          .col(text(Message::TopicId).null())
          .col(text(Message::ExtractionStatus).default("unprocessed"))
          .col(custom(Message::Embedding, "vector(1536)").null())
          .col(timestamp_with_time_zone(Message::CreatedAt).default(Expr::current_timestamp()))
          .foreign_key(
            ForeignKey::create()
              .from(Message::Table, Message::InteractionId)
              .to(Interaction::Table, Interaction::Id),
          )
          .to_owned(),
      )
      .await?;

    for sql in [
      // Idempotent ingest: at most one stored message per source id within an interaction.
      "CREATE UNIQUE INDEX idx_message_source_id ON message (interaction_id, source_message_id) WHERE source_message_id IS NOT NULL;",
      // One open session per chat key.
      "CREATE UNIQUE INDEX idx_interaction_open_key ON interaction (source, chat_id, COALESCE(topic_id, '')) WHERE status = 'active';",
      "CREATE INDEX idx_interaction_chat_key ON interaction (source, chat_id, started_at DESC);",
      "CREATE UNIQUE INDEX idx_participant_key ON interaction_participant (interaction_id, identifier_type, identifier_value);",
      "CREATE INDEX idx_message_interaction_ts ON message (interaction_id, timestamp);",
      "CREATE INDEX idx_message_embedding ON message USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);",
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
      Table::drop().table(Message::Table).to_owned(),
      Table::drop().table(InteractionParticipant::Table).to_owned(),
      Table::drop().table(Interaction::Table).to_owned(),
    ] {
      manager.drop_table(table).await?;
    }
    Ok(())
  }
}

#[derive(Iden)]
pub enum Interaction {
  Table,
  Id,
  InteractionType,
  Source,
  ChatId,
  TopicId,
  Status,
  StartedAt,
  EndedAt,
  LastMessageAt,
  SourceMetadata,
  NeedsResegmentation,
  SegmentedAt,
  CreatedAt,
  UpdatedAt,
}

#[derive(Iden)]
pub enum InteractionParticipant {
  Table,
  Id,
  InteractionId,
  EntityId,
  Role,
  IdentifierType,
  IdentifierValue,
  DisplayName,
  CreatedAt,
}

#[derive(Iden)]
pub enum Message {
  Table,
  Id,
  InteractionId,
  SenderEntityId,
  RecipientEntityId,
  SenderIdentifierType,
  SenderIdentifierValue,
  Content,
  IsOutgoing,
  Timestamp,
  SourceMessageId,
  ReplyToMessageId,
  MediaType,
  ChatType,
  TopicId,
  ExtractionStatus,
  Embedding,
  CreatedAt,
}
