use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A typed link between two entities (employment, team, client_vendor).
/// `valid_until IS NULL` marks the relation as current.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "entity_relation")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub from_entity_id: Uuid,
  pub to_entity_id: Uuid,
  /// "employment" | "team" | "client_vendor"
  pub relation_type: String,
  pub valid_from: Option<DateTimeWithTimeZone>,
  pub valid_until: Option<DateTimeWithTimeZone>,
  pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
