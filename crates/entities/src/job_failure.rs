use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Dead-letter record for a terminally failed queue job.
/// Pruned keeping the most recent 5000 per queue.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "job_failure")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub queue: String,
  pub payload: Json,
  pub error: String,
  pub failed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
