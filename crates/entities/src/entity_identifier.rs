use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A (type, value) pair tying an entity to a source-platform identity.
/// `(identifier_type, identifier_value)` is globally unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "entity_identifier")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub entity_id: Uuid,
  /// e.g. "telegram_user_id", "phone", "email"
  pub identifier_type: String,
  pub identifier_value: String,
  pub metadata: Option<Json>,
  pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::entity::Entity",
    from = "Column::EntityId",
    to = "super::entity::Column::Id"
  )]
  Entity,
}

impl Related<super::entity::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Entity.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
