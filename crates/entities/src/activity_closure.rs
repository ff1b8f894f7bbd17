use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Closure table mirroring ancestor-descendant pairs of the activity tree.
/// Every node has a self-row with `depth = 0`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "activity_closure")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub ancestor_id: Uuid,
  #[sea_orm(primary_key, auto_increment = false)]
  pub descendant_id: Uuid,
  pub depth: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
