use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A draft's presence in the operator review queue.
///
/// `target_id` is a polymorphic reference resolved through `item_type` by the
/// approval registry. Status transitions are monotonic:
/// pending → approved | rejected, never reversed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "pending_approval")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// "fact" | "project" | "task" | "commitment"
  pub item_type: String,
  pub target_id: Uuid,
  /// Shared by all drafts from one extraction run.
  pub batch_id: Uuid,
  /// "pending" | "approved" | "rejected"
  pub status: String,
  pub confidence: f64,
  /// Verbatim quote from the source conversation.
  pub source_quote: Option<String>,
  pub source_interaction_id: Option<Uuid>,
  pub source_entity_id: Option<Uuid>,
  pub context: Option<String>,
  pub created_at: DateTimeWithTimeZone,
  pub reviewed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
