use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One utterance inside an interaction. Append-only.
/// `(interaction_id, source_message_id)` is unique when the source id is present.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "message")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub interaction_id: Uuid,
  pub sender_entity_id: Option<Uuid>,
  pub recipient_entity_id: Option<Uuid>,
  pub sender_identifier_type: String,
  pub sender_identifier_value: String,
  pub content: String,
  pub is_outgoing: bool,
  pub timestamp: DateTimeWithTimeZone,
  /// Message id assigned by the origin platform.
  pub source_message_id: Option<String>,
  pub reply_to_message_id: Option<String>,
  pub media_type: Option<String>,
  pub chat_type: Option<String>,
  pub topic_id: Option<String>,
  /// "unprocessed" | "pending" | "processed" | "failed"
  pub extraction_status: String,
  #[serde(skip)]
  pub embedding: Option<PgVector>,
  pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::interaction::Entity",
    from = "Column::InteractionId",
    to = "super::interaction::Column::Id"
  )]
  Interaction,
}

impl Related<super::interaction::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Interaction.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
