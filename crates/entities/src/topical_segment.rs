use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A contiguous sub-sequence of messages sharing a topic — the unit of extraction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "topical_segment")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub chat_id: String,
  pub interaction_id: Option<Uuid>,
  pub topic: String,
  pub keywords: Vec<String>,
  pub summary: String,
  pub participant_ids: Vec<Uuid>,
  pub primary_participant_id: Option<Uuid>,
  pub message_count: i32,
  pub started_at: DateTimeWithTimeZone,
  pub ended_at: DateTimeWithTimeZone,
  /// Ids of drafts produced from this segment, keyed by item type.
  pub extracted_items: Option<Json>,
  /// "active" | "merged" | "superseded"
  pub status: String,
  /// min(LLM confidence, keyword coverage)
  pub confidence: f64,
  /// Cross-chat topic links, symmetric.
  pub related_segment_ids: Vec<Uuid>,
  /// "unprocessed" | "pending" | "processed" | "failed"
  pub extraction_status: String,
  pub extraction_attempts: i32,
  pub extraction_error: Option<String>,
  /// Approval batch produced by the extraction run.
  pub batch_id: Option<Uuid>,
  #[serde(skip)]
  pub embedding: Option<PgVector>,
  pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::segment_message::Entity")]
  SegmentMessage,
}

impl Related<super::segment_message::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::SegmentMessage.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
