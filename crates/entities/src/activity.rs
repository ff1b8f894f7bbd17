use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A tree-shaped work item: areas → businesses → projects → tasks.
///
/// `depth`, `materialized_path`, and the closure table are maintained
/// together inside the transaction that changes `parent_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "activity")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub name: String,
  /// "area" | "business" | "direction" | "project" | "initiative" | "task"
  /// | "milestone" | "habit" | "learning" | "event_series"
  pub activity_type: String,
  /// "draft" | "idea" | "active" | "paused" | "completed" | "cancelled" | "archived"
  pub status: String,
  pub priority: Option<i32>,
  pub context: Option<String>,
  pub parent_id: Option<Uuid>,
  /// 0 at root, parent.depth + 1 otherwise.
  pub depth: i32,
  /// Slash-joined ancestor UUIDs; used for ancestor lookups without a recursive CTE.
  pub materialized_path: String,
  pub owner_entity_id: Option<Uuid>,
  pub client_entity_id: Option<Uuid>,
  pub start_date: Option<DateTimeWithTimeZone>,
  pub due_date: Option<DateTimeWithTimeZone>,
  pub completed_at: Option<DateTimeWithTimeZone>,
  pub tags: Vec<String>,
  pub needs_review: bool,
  pub review_reason: Option<String>,
  pub confirmation_count: i32,
  /// Free-form extraction metadata (draft batch id, possible duplicates).
  pub metadata: Option<Json>,
  #[serde(skip)]
  pub embedding: Option<PgVector>,
  pub created_at: DateTimeWithTimeZone,
  pub updated_at: DateTimeWithTimeZone,
  pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
