use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A person or organization — the unit of identity in the graph.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "entity")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// "person" | "organization"
  pub entity_type: String,
  pub name: String,
  /// Self-reference to an entity of type "organization".
  pub organization_id: Option<Uuid>,
  pub notes: Option<String>,
  /// At most one entity carries this flag.
  pub is_owner: bool,
  pub is_bot: bool,
  /// "manual" | "extracted" | "imported"
  pub creation_source: String,
  pub created_at: DateTimeWithTimeZone,
  pub updated_at: DateTimeWithTimeZone,
  pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::entity_identifier::Entity")]
  EntityIdentifier,
  #[sea_orm(has_many = "super::entity_fact::Entity")]
  EntityFact,
}

impl Related<super::entity_identifier::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::EntityIdentifier.def()
  }
}

impl Related<super::entity_fact::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::EntityFact.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
