use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A promise/request between two entities, optionally recurring.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "commitment")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// "promise" | "request" | "agreement" | "deadline" | "reminder" | "recurring"
  pub commitment_type: String,
  pub title: String,
  pub description: Option<String>,
  /// "draft" | "pending" | "in_progress" | "completed" | "cancelled" | "overdue" | "deferred"
  pub status: String,
  pub from_entity_id: Option<Uuid>,
  pub to_entity_id: Option<Uuid>,
  /// Unresolved counterparty mention kept as free text.
  pub to_display_name: Option<String>,
  pub activity_id: Option<Uuid>,
  pub source_message_id: Option<Uuid>,
  pub source_interaction_id: Option<Uuid>,
  pub due_date: Option<DateTimeWithTimeZone>,
  /// Cron-like rule for recurring commitments.
  pub recurrence_rule: Option<String>,
  pub next_reminder_at: Option<DateTimeWithTimeZone>,
  pub reminder_count: i32,
  pub confidence: f64,
  pub needs_review: bool,
  pub review_reason: Option<String>,
  pub confirmation_count: i32,
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
