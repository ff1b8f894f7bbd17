use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A time-bounded conversation session aggregating messages.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "interaction")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// "telegram_session" | "phone_call" | "video_meeting"
  pub interaction_type: String,
  pub source: String,
  /// Source-side chat key. Together with `topic_id` this keys the open session.
  pub chat_id: String,
  pub topic_id: Option<String>,
  /// "active" | "completed" | "archived"
  pub status: String,
  pub started_at: DateTimeWithTimeZone,
  /// Unset while `status = active`.
  pub ended_at: Option<DateTimeWithTimeZone>,
  pub last_message_at: DateTimeWithTimeZone,
  pub source_metadata: Option<Json>,
  /// Set when a late arrival lands inside a closed session.
  pub needs_resegmentation: bool,
  pub segmented_at: Option<DateTimeWithTimeZone>,
  pub created_at: DateTimeWithTimeZone,
  pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::message::Entity")]
  Message,
  #[sea_orm(has_many = "super::interaction_participant::Entity")]
  InteractionParticipant,
}

impl Related<super::message::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Message.def()
  }
}

impl Related<super::interaction_participant::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::InteractionParticipant.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
