use chrono::Utc;
use plexus_entities::{entity, entity_fact, entity_identifier, interaction_participant, message};
use plexus_shared::AppError;
use sea_orm::{
  ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
  QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::Expr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{CreationSource, EntityType, FactRank};

pub struct EntityStore;

#[derive(Debug, Clone)]
pub struct NewEntity {
  pub entity_type: EntityType,
  pub name: String,
  pub organization_id: Option<Uuid>,
  pub notes: Option<String>,
  pub is_owner: bool,
  pub is_bot: bool,
  pub creation_source: CreationSource,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEntity {
  pub name: Option<String>,
  pub organization_id: Option<Option<Uuid>>,
  pub notes: Option<Option<String>>,
  pub is_bot: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
  pub entity_type: Option<EntityType>,
  pub search: Option<String>,
  pub include_deleted: bool,
  pub limit: u64,
  pub offset: u64,
}

/// Counts returned by `merge`.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
  pub identifiers_moved: u64,
  pub facts_moved: u64,
  pub source_deleted: bool,
}

impl EntityStore {
  pub async fn create(new: NewEntity, db: &DatabaseConnection) -> Result<entity::Model, AppError> {
    if let Some(org_id) = new.organization_id {
      let org = Self::get(org_id, db).await?;
      if org.entity_type != EntityType::Organization.to_string() {
        return Err(AppError::validation("organization_id must reference an organization"));
      }
    }

    let now = Utc::now();
    let model = entity::ActiveModel {
      id: Set(Uuid::new_v4()),
      entity_type: Set(new.entity_type.to_string()),
      name: Set(new.name),
      organization_id: Set(new.organization_id),
      notes: Set(new.notes),
      is_owner: Set(new.is_owner),
      is_bot: Set(new.is_bot),
      creation_source: Set(new.creation_source.to_string()),
      created_at: Set(now.into()),
      updated_at: Set(now.into()),
      deleted_at: Set(None),
    };

    Ok(model.insert(db).await?)
  }

  /// Fetch a live entity. Soft-deleted rows are treated as missing.
  pub async fn get(id: Uuid, db: &DatabaseConnection) -> Result<entity::Model, AppError> {
    entity::Entity::find_by_id(id)
      .filter(entity::Column::DeletedAt.is_null())
      .one(db)
      .await?
      .ok_or_else(|| AppError::not_found(format!("entity {id} not found")))
  }

  pub async fn list(
    filter: EntityFilter,
    db: &DatabaseConnection,
  ) -> Result<Vec<entity::Model>, AppError> {
    let mut query = entity::Entity::find();

    if !filter.include_deleted {
      query = query.filter(entity::Column::DeletedAt.is_null());
    }
    if let Some(entity_type) = filter.entity_type {
      query = query.filter(entity::Column::EntityType.eq(entity_type.to_string()));
    }
    if let Some(search) = &filter.search {
      query = query.filter(entity::Column::Name.contains(search));
    }

    let limit = if filter.limit == 0 { 50 } else { filter.limit.min(200) };
    Ok(
      query
        .order_by_desc(entity::Column::UpdatedAt)
        .limit(limit)
        .offset(filter.offset)
        .all(db)
        .await?,
    )
  }

  pub async fn update(
    id: Uuid,
    update: UpdateEntity,
    db: &DatabaseConnection,
  ) -> Result<entity::Model, AppError> {
    let model = Self::get(id, db).await?;
    let mut active: entity::ActiveModel = model.into();

    if let Some(name) = update.name {
      active.name = Set(name);
    }
    if let Some(org) = update.organization_id {
      active.organization_id = Set(org);
    }
    if let Some(notes) = update.notes {
      active.notes = Set(notes);
    }
    if let Some(is_bot) = update.is_bot {
      active.is_bot = Set(is_bot);
    }
    active.updated_at = Set(Utc::now().into());

    Ok(active.update(db).await?)
  }

  /// Soft delete: the row stays referenced by historical relations but is
  /// excluded from default queries.
  pub async fn soft_delete(id: Uuid, db: &DatabaseConnection) -> Result<(), AppError> {
    let model = Self::get(id, db).await?;
    let mut active: entity::ActiveModel = model.into();
    active.deleted_at = Set(Some(Utc::now().into()));
    active.updated_at = Set(Utc::now().into());
    active.update(db).await?;
    Ok(())
  }

  /// Merge `source_id` into `target_id` inside one transaction:
  /// reassign identifiers (dropping duplicates), reassign facts and collapse
  /// conflicts, reassign participants and message links, soft-delete source.
  pub async fn merge(
    source_id: Uuid,
    target_id: Uuid,
    db: &DatabaseConnection,
  ) -> Result<MergeOutcome, AppError> {
    if source_id == target_id {
      return Err(AppError::validation("cannot merge an entity into itself"));
    }

    // Existence checks before opening the transaction.
    Self::get(source_id, db).await?;
    Self::get(target_id, db).await?;

    let txn = db.begin().await?;

    // --- Identifiers: move unless the (type, value) already exists on target.
    let source_identifiers = entity_identifier::Entity::find()
      .filter(entity_identifier::Column::EntityId.eq(source_id))
      .all(&txn)
      .await?;

    let mut identifiers_moved = 0u64;
    for identifier in source_identifiers {
      let duplicate = entity_identifier::Entity::find()
        .filter(entity_identifier::Column::EntityId.eq(target_id))
        .filter(entity_identifier::Column::IdentifierType.eq(identifier.identifier_type.clone()))
        .filter(entity_identifier::Column::IdentifierValue.eq(identifier.identifier_value.clone()))
        .count(&txn)
        .await?
        > 0;

      if duplicate {
        tracing::info!(
          source = %source_id,
          target = %target_id,
          identifier_type = %identifier.identifier_type,
          "Dropping duplicate identifier during merge"
        );
        entity_identifier::Entity::delete_by_id(identifier.id).exec(&txn).await?;
      } else {
        let mut active: entity_identifier::ActiveModel = identifier.into();
        active.entity_id = Set(target_id);
        active.update(&txn).await?;
        identifiers_moved += 1;
      }
    }

    // --- Facts: move everything, then collapse per-fact-type conflicts.
    let facts_moved = entity_fact::Entity::update_many()
      .col_expr(entity_fact::Column::EntityId, Expr::value(target_id))
      .filter(entity_fact::Column::EntityId.eq(source_id))
      .filter(entity_fact::Column::DeletedAt.is_null())
      .exec(&txn)
      .await?
      .rows_affected;

    collapse_fact_conflicts(target_id, &txn).await?;

    // --- Interaction participants and message sender/recipient links.
    interaction_participant::Entity::update_many()
      .col_expr(interaction_participant::Column::EntityId, Expr::value(target_id))
      .filter(interaction_participant::Column::EntityId.eq(source_id))
      .exec(&txn)
      .await?;

    message::Entity::update_many()
      .col_expr(message::Column::SenderEntityId, Expr::value(target_id))
      .filter(message::Column::SenderEntityId.eq(source_id))
      .exec(&txn)
      .await?;
    message::Entity::update_many()
      .col_expr(message::Column::RecipientEntityId, Expr::value(target_id))
      .filter(message::Column::RecipientEntityId.eq(source_id))
      .exec(&txn)
      .await?;

    // --- Soft-delete the source.
    entity::Entity::update_many()
      .col_expr(entity::Column::DeletedAt, Expr::value(Some(Utc::now())))
      .col_expr(entity::Column::UpdatedAt, Expr::value(Utc::now()))
      .filter(entity::Column::Id.eq(source_id))
      .exec(&txn)
      .await?;

    txn.commit().await?;

    tracing::info!(
      source = %source_id,
      target = %target_id,
      identifiers_moved,
      facts_moved,
      "Merged entities"
    );

    Ok(MergeOutcome {
      identifiers_moved,
      facts_moved,
      source_deleted: true,
    })
  }
}

#[derive(Debug, Clone)]
pub struct NewFact {
  pub fact_type: String,
  pub category: Option<String>,
  pub value: Option<String>,
  pub value_date: Option<chrono::NaiveDate>,
  pub value_json: Option<serde_json::Value>,
  pub source: crate::types::FactSource,
  pub confidence: f64,
  pub source_interaction_id: Option<Uuid>,
}

impl EntityStore {
  /// Active facts for an entity, preferred rank first.
  pub async fn list_facts(
    entity_id: Uuid,
    db: &DatabaseConnection,
  ) -> Result<Vec<entity_fact::Model>, AppError> {
    Self::get(entity_id, db).await?;
    Ok(
      entity_fact::Entity::find()
        .filter(entity_fact::Column::EntityId.eq(entity_id))
        .filter(entity_fact::Column::DeletedAt.is_null())
        .filter(entity_fact::Column::Rank.ne(FactRank::Deprecated.to_string()))
        .order_by_desc(entity_fact::Column::CreatedAt)
        .all(db)
        .await?,
    )
  }

  /// Record a fact. Values are never mutated in place: an active fact of the
  /// same type with a different value is deprecated and linked to the new one
  /// via `superseded_by`.
  pub async fn create_fact(
    entity_id: Uuid,
    new: NewFact,
    db: &DatabaseConnection,
  ) -> Result<entity_fact::Model, AppError> {
    if !(0.0..=1.0).contains(&new.confidence) {
      return Err(AppError::validation("confidence must be in [0, 1]"));
    }
    Self::get(entity_id, db).await?;

    let txn = db.begin().await?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let model = entity_fact::ActiveModel {
      id: Set(id),
      entity_id: Set(entity_id),
      fact_type: Set(new.fact_type.clone()),
      category: Set(new.category),
      value: Set(new.value.clone()),
      value_date: Set(new.value_date),
      value_json: Set(new.value_json),
      source: Set(new.source.to_string()),
      confidence: Set(new.confidence),
      source_interaction_id: Set(new.source_interaction_id),
      valid_from: Set(Some(now.into())),
      valid_until: Set(None),
      status: Set(crate::types::FactStatus::Active.to_string()),
      rank: Set(FactRank::Normal.to_string()),
      superseded_by: Set(None),
      needs_review: Set(false),
      review_reason: Set(None),
      confirmation_count: Set(0),
      metadata: Set(None),
      embedding: Set(None),
      created_at: Set(now.into()),
      updated_at: Set(now.into()),
      deleted_at: Set(None),
    };
    let inserted = model.insert(&txn).await?;

    // Supersede the previously active fact of this type when the value moved.
    entity_fact::Entity::update_many()
      .col_expr(entity_fact::Column::Rank, Expr::value(FactRank::Deprecated.to_string()))
      .col_expr(entity_fact::Column::SupersededBy, Expr::value(Some(id)))
      .col_expr(entity_fact::Column::ValidUntil, Expr::value(Some(now)))
      .col_expr(entity_fact::Column::UpdatedAt, Expr::value(now))
      .filter(entity_fact::Column::EntityId.eq(entity_id))
      .filter(entity_fact::Column::FactType.eq(new.fact_type))
      .filter(entity_fact::Column::Id.ne(id))
      .filter(entity_fact::Column::DeletedAt.is_null())
      .filter(entity_fact::Column::Rank.ne(FactRank::Deprecated.to_string()))
      .filter(entity_fact::Column::Value.ne(new.value))
      .exec(&txn)
      .await?;

    txn.commit().await?;
    Ok(inserted)
  }

  pub async fn soft_delete_fact(fact_id: Uuid, db: &DatabaseConnection) -> Result<(), AppError> {
    let updated = entity_fact::Entity::update_many()
      .col_expr(entity_fact::Column::DeletedAt, Expr::value(Some(Utc::now())))
      .col_expr(entity_fact::Column::UpdatedAt, Expr::value(Utc::now()))
      .filter(entity_fact::Column::Id.eq(fact_id))
      .filter(entity_fact::Column::DeletedAt.is_null())
      .exec(db)
      .await?;

    if updated.rows_affected == 0 {
      return Err(AppError::not_found(format!("fact {fact_id} not found")));
    }
    Ok(())
  }
}

/// Decide which of two conflicting facts wins: higher rank, then higher
/// confidence, then more recent creation.
pub(crate) fn fact_wins(
  a_rank: FactRank,
  a_confidence: f64,
  a_created: chrono::DateTime<Utc>,
  b_rank: FactRank,
  b_confidence: f64,
  b_created: chrono::DateTime<Utc>,
) -> bool {
  (a_rank, a_confidence, a_created) > (b_rank, b_confidence, b_created)
}

/// After moving facts onto `entity_id`, deprecate the loser of every active
/// same-fact-type pair with differing values.
async fn collapse_fact_conflicts<C: ConnectionTrait>(
  entity_id: Uuid,
  db: &C,
) -> Result<(), AppError> {
  let facts = entity_fact::Entity::find()
    .filter(entity_fact::Column::EntityId.eq(entity_id))
    .filter(entity_fact::Column::DeletedAt.is_null())
    .filter(entity_fact::Column::Rank.ne(FactRank::Deprecated.to_string()))
    .order_by_asc(entity_fact::Column::FactType)
    .all(db)
    .await?;

  let mut by_type: std::collections::HashMap<&str, Vec<&entity_fact::Model>> =
    std::collections::HashMap::new();
  for fact in &facts {
    by_type.entry(fact.fact_type.as_str()).or_default().push(fact);
  }

  for (_, group) in by_type {
    if group.len() < 2 {
      continue;
    }

    let winner = group
      .iter()
      .copied()
      .reduce(|best, fact| {
        let best_rank: FactRank = best.rank.parse().unwrap_or(FactRank::Normal);
        let fact_rank: FactRank = fact.rank.parse().unwrap_or(FactRank::Normal);
        if fact_wins(
          fact_rank,
          fact.confidence,
          fact.created_at.to_utc(),
          best_rank,
          best.confidence,
          best.created_at.to_utc(),
        ) {
          fact
        } else {
          best
        }
      })
      .expect("group is non-empty");

    for fact in group {
      if fact.id == winner.id || fact.value == winner.value {
        continue;
      }
      entity_fact::Entity::update_many()
        .col_expr(entity_fact::Column::Rank, Expr::value(FactRank::Deprecated.to_string()))
        .col_expr(entity_fact::Column::SupersededBy, Expr::value(Some(winner.id)))
        .col_expr(entity_fact::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(entity_fact::Column::Id.eq(fact.id))
        .exec(db)
        .await?;
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn rank_beats_confidence() {
    let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    assert!(fact_wins(FactRank::Preferred, 0.2, early, FactRank::Normal, 0.9, late));
  }

  #[test]
  fn confidence_breaks_rank_ties() {
    let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    assert!(fact_wins(FactRank::Normal, 0.9, t, FactRank::Normal, 0.5, t));
    assert!(!fact_wins(FactRank::Normal, 0.5, t, FactRank::Normal, 0.9, t));
  }

  #[test]
  fn recency_breaks_full_ties() {
    let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    assert!(fact_wins(FactRank::Normal, 0.7, late, FactRank::Normal, 0.7, early));
  }
}
