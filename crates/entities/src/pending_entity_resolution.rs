use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Queue row for an unresolved identifier seen in messages.
/// `(identifier_type, identifier_value)` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "pending_entity_resolution")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub identifier_type: String,
  pub identifier_value: String,
  pub display_name: Option<String>,
  /// "pending" | "resolved" | "merged"
  pub status: String,
  pub resolved_entity_id: Option<Uuid>,
  /// "auto" | "manual" once resolved.
  pub resolution: Option<String>,
  /// Ranked disambiguation suggestions, serialized.
  pub suggestions: Option<Json>,
  /// Capped at 10 sample ids.
  pub sample_message_ids: Vec<Uuid>,
  pub first_seen_at: DateTimeWithTimeZone,
  pub resolved_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
