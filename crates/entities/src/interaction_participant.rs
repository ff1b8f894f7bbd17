use sea_orm::entity::prelude::*;
use serde::Serialize;

/// An entity-or-placeholder present in an interaction.
/// `(interaction_id, identifier_type, identifier_value)` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "interaction_participant")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub interaction_id: Uuid,
  /// Null until the identifier resolves.
  pub entity_id: Option<Uuid>,
  /// "initiator" | "recipient" | "participant" | "self"
  pub role: String,
  pub identifier_type: String,
  pub identifier_value: String,
  pub display_name: Option<String>,
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
