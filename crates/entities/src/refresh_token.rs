use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A rotating refresh-token record keyed by `(user_id, jti)`.
/// The token itself is stored as a SHA-256 hash; presenting a revoked hash
/// is treated as reuse and revokes the whole family for the user.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "refresh_token")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub user_id: Uuid,
  pub jti: Uuid,
  #[serde(skip)]
  pub token_hash: String,
  pub expires_at: DateTimeWithTimeZone,
  pub revoked_at: Option<DateTimeWithTimeZone>,
  pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::operator::Entity",
    from = "Column::UserId",
    to = "super::operator::Column::Id"
  )]
  Operator,
}

impl Related<super::operator::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Operator.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
