use sea_orm::entity::prelude::*;
use serde::Serialize;

/// An atomic claim about an entity (birthday, employer, city, ...).
///
/// Facts are never mutated in place: a changed value inserts a new fact and
/// the old one becomes `rank = deprecated` with `superseded_by` pointing at
/// the replacement. Active readers query `status = active AND rank != deprecated`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "entity_fact")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub entity_id: Uuid,
  pub fact_type: String,
  pub category: Option<String>,
  pub value: Option<String>,
  pub value_date: Option<Date>,
  pub value_json: Option<Json>,
  /// "manual" | "extracted" | "imported" | "inferred"
  pub source: String,
  /// In [0, 1].
  pub confidence: f64,
  pub source_interaction_id: Option<Uuid>,
  pub valid_from: Option<DateTimeWithTimeZone>,
  pub valid_until: Option<DateTimeWithTimeZone>,
  /// "draft" | "active"
  pub status: String,
  /// Wikidata-style: "preferred" | "normal" | "deprecated"
  pub rank: String,
  /// Fact-fact link forming a DAG.
  pub superseded_by: Option<Uuid>,
  pub needs_review: bool,
  pub review_reason: Option<String>,
  pub confirmation_count: i32,
  /// Free-form provenance (confirmation message ids, suspected duplicates).
  pub metadata: Option<Json>,
  #[serde(skip)]
  pub embedding: Option<PgVector>,
  pub created_at: DateTimeWithTimeZone,
  pub updated_at: DateTimeWithTimeZone,
  pub deleted_at: Option<DateTimeWithTimeZone>,
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
