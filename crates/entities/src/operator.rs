use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Login account for the REST surface.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "operator")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  #[sea_orm(unique)]
  pub username: String,
  #[serde(skip)]
  pub password_hash: String,
  pub failed_attempts: i32,
  pub locked_until: Option<DateTimeWithTimeZone>,
  pub created_at: DateTimeWithTimeZone,
  pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::refresh_token::Entity")]
  RefreshToken,
}

impl Related<super::refresh_token::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::RefreshToken.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
