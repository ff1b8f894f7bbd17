use sea_orm_migration::{
  prelude::*,
  schema::{custom, double, integer, json_binary, text, timestamp_with_time_zone, uuid},
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
          .table(TopicalSegment::Table)
          .if_not_exists()
          .col(uuid(TopicalSegment::Id).primary_key())
          .col(text(TopicalSegment::ChatId))
          .col(uuid(TopicalSegment::InteractionId).null())
          .col(text(TopicalSegment::Topic))
          .col(custom(TopicalSegment::Keywords, "TEXT[] NOT NULL DEFAULT '{}'"))
          .col(text(TopicalSegment::Summary))
          .col(custom(TopicalSegment::ParticipantIds, "UUID[] NOT NULL DEFAULT '{}'"))
          .col(uuid(TopicalSegment::PrimaryParticipantId).null())
          .col(integer(TopicalSegment::MessageCount).default(0))
          .col(timestamp_with_time_zone(TopicalSegment::StartedAt))
          .col(timestamp_with_time_zone(TopicalSegment::EndedAt))
          .col(json_binary(TopicalSegment::ExtractedItems).null())
          .col(text(TopicalSegment::Status).default("active"))
          .col(double(TopicalSegment::Confidence).default(0.0))
          .col(custom(TopicalSegment::RelatedSegmentIds, "UUID[] NOT NULL DEFAULT '{}'"))
          .col(text(TopicalSegment::ExtractionStatus).default("unprocessed"))
          .col(integer(TopicalSegment::ExtractionAttempts).default(0))
          .col(text(TopicalSegment::ExtractionError).null())
          .col(uuid(TopicalSegment::BatchId).null())
          .col(custom(TopicalSegment::Embedding, "vector(1536)").null())
          .col(
            timestamp_with_time_zone(TopicalSegment::CreatedAt).default(Expr::current_timestamp()),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(SegmentMessage::Table)
          .if_not_exists()
          .col(uuid(SegmentMessage::SegmentId))
          .col(uuid(SegmentMessage::MessageId))
          .col(integer(SegmentMessage::Position))
          .primary_key(
            Index::create()
              .col(SegmentMessage::SegmentId)
              .col(SegmentMessage::MessageId),
          )
          .to_owned(),
      )
      .await?;

    for sql in [
      "CREATE INDEX idx_segment_chat_time ON topical_segment (chat_id, started_at DESC);",
      "CREATE INDEX idx_segment_extraction ON topical_segment (extraction_status) WHERE extraction_status IN ('unprocessed', 'failed');",
      "CREATE INDEX idx_segment_embedding ON topical_segment USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);",
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
      Table::drop().table(SegmentMessage::Table).to_owned(),
      Table::drop().table(TopicalSegment::Table).to_owned(),
    ] {
      manager.drop_table(table).await?;
    }
    Ok(())
  }
}

#[derive(Iden)]
pub enum TopicalSegment {
  Table,
  Id,
  ChatId,
  InteractionId,
  Topic,
  Keywords,
  Summary,
  ParticipantIds,
  PrimaryParticipantId,
  MessageCount,
  StartedAt,
  EndedAt,
  ExtractedItems,
  Status,
  Confidence,
  RelatedSegmentIds,
  ExtractionStatus,
  ExtractionAttempts,
  ExtractionError,
  BatchId,
  Embedding,
  CreatedAt,
}

#[derive(Iden)]
pub enum SegmentMessage {
  Table,
  SegmentId,
  MessageId,
  Position,
}
