use chrono::Utc;
use plexus_entities::{
  entity, entity_identifier, interaction_participant, message, pending_entity_resolution,
};
use plexus_shared::AppError;
use sea_orm::{
  ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter, Set,
  Statement, TransactionTrait, prelude::Expr, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::entity::store::{EntityStore, NewEntity};
use crate::types::{CreationSource, EntityType, ResolutionStatus};

/// Maximum sample message ids kept on a pending resolution row.
const SAMPLE_CAP: usize = 10;

pub struct IdentifierResolver;

/// Result of resolving a source-side identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Resolved { entity_id: Uuid },
  Pending,
}

impl IdentifierResolver {
  /// Map `(identifier_type, identifier_value)` to an entity.
  ///
  /// On a miss, a `PendingEntityResolution` row is upserted and the sample
  /// message id appended (capped). If `display_name` exactly matches a single
  /// active entity's name and no other candidate exists, the identifier is
  /// auto-attached (`resolution = auto`).
  pub async fn resolve(
    identifier_type: &str,
    identifier_value: &str,
    display_name: Option<&str>,
    sample_message_id: Option<Uuid>,
    db: &DatabaseConnection,
  ) -> Result<Resolution, AppError> {
    if let Some(existing) = entity_identifier::Entity::find()
      .filter(entity_identifier::Column::IdentifierType.eq(identifier_type))
      .filter(entity_identifier::Column::IdentifierValue.eq(identifier_value))
      .one(db)
      .await?
    {
      return Ok(Resolution::Resolved { entity_id: existing.entity_id });
    }

    // Auto-attach: a unique exact name match among active entities.
    if let Some(name) = display_name {
      let candidates = entity::Entity::find()
        .filter(entity::Column::Name.eq(name))
        .filter(entity::Column::DeletedAt.is_null())
        .all(db)
        .await?;

      if candidates.len() == 1 {
        let entity_id = candidates[0].id;
        Self::attach_identifier(
          identifier_type,
          identifier_value,
          entity_id,
          Some("auto"),
          db,
        )
        .await?;
        tracing::info!(
          identifier_type,
          identifier_value,
          entity_id = %entity_id,
          "Auto-resolved identifier by unique name match"
        );
        return Ok(Resolution::Resolved { entity_id });
      }
    }

    Self::upsert_pending(identifier_type, identifier_value, display_name, sample_message_id, db)
      .await?;
    Ok(Resolution::Pending)
  }

  async fn upsert_pending(
    identifier_type: &str,
    identifier_value: &str,
    display_name: Option<&str>,
    sample_message_id: Option<Uuid>,
    db: &DatabaseConnection,
  ) -> Result<(), AppError> {
    let active_model = pending_entity_resolution::ActiveModel {
      id: Set(Uuid::new_v4()),
      identifier_type: Set(identifier_type.to_owned()),
      identifier_value: Set(identifier_value.to_owned()),
      display_name: Set(display_name.map(ToOwned::to_owned)),
      status: Set(ResolutionStatus::Pending.to_string()),
      resolved_entity_id: Set(None),
      resolution: Set(None),
      suggestions: Set(None),
      sample_message_ids: Set(sample_message_id.into_iter().collect()),
      first_seen_at: Set(Utc::now().into()),
      resolved_at: Set(None),
    };

    let inserted = pending_entity_resolution::Entity::insert(active_model)
      .on_conflict(
        OnConflict::columns([
          pending_entity_resolution::Column::IdentifierType,
          pending_entity_resolution::Column::IdentifierValue,
        ])
        .do_nothing()
        .to_owned(),
      )
      .exec_without_returning(db)
      .await?;

    // Existing row: append the sample id (capped) and backfill the name.
    if inserted == 0 && sample_message_id.is_some() {
      let sql = "UPDATE pending_entity_resolution \
                 SET sample_message_ids = (sample_message_ids || $1)[1:$2], \
                     display_name = COALESCE(display_name, $3) \
                 WHERE identifier_type = $4 AND identifier_value = $5 \
                   AND NOT sample_message_ids @> ARRAY[$1] \
                   AND cardinality(sample_message_ids) < $2";
      db.execute_raw(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        [
          sample_message_id.into(),
          (SAMPLE_CAP as i32).into(),
          display_name.into(),
          identifier_type.into(),
          identifier_value.into(),
        ],
      ))
      .await?;
    }

    Ok(())
  }

  /// Operator action: attach a pending identifier to an existing entity.
  /// Idempotent: re-attaching to the same entity is a no-op.
  pub async fn attach(
    pending_id: Uuid,
    entity_id: Uuid,
    db: &DatabaseConnection,
  ) -> Result<(), AppError> {
    let pending = pending_entity_resolution::Entity::find_by_id(pending_id)
      .one(db)
      .await?
      .ok_or_else(|| AppError::not_found(format!("pending resolution {pending_id} not found")))?;

    if pending.status == ResolutionStatus::Resolved.to_string() {
      if pending.resolved_entity_id == Some(entity_id) {
        return Ok(());
      }
      return Err(AppError::conflict("pending resolution already resolved to another entity"));
    }

    EntityStore::get(entity_id, db).await?;
    Self::attach_identifier(
      &pending.identifier_type,
      &pending.identifier_value,
      entity_id,
      Some("manual"),
      db,
    )
    .await
  }

  /// Operator action: create a new entity for the pending identifier.
  pub async fn create_new(
    pending_id: Uuid,
    name: String,
    entity_type: EntityType,
    db: &DatabaseConnection,
  ) -> Result<Uuid, AppError> {
    let pending = pending_entity_resolution::Entity::find_by_id(pending_id)
      .one(db)
      .await?
      .ok_or_else(|| AppError::not_found(format!("pending resolution {pending_id} not found")))?;

    if pending.status != ResolutionStatus::Pending.to_string() {
      return Err(AppError::conflict("pending resolution is not pending"));
    }

    let created = EntityStore::create(
      NewEntity {
        entity_type,
        name,
        organization_id: None,
        notes: None,
        is_owner: false,
        is_bot: false,
        creation_source: CreationSource::Extracted,
      },
      db,
    )
    .await?;

    Self::attach_identifier(
      &pending.identifier_type,
      &pending.identifier_value,
      created.id,
      Some("manual"),
      db,
    )
    .await?;

    Ok(created.id)
  }

  /// Operator action: dismiss a pending row without a target. The identifier
  /// stays unattached so future sightings batch onto the same row.
  pub async fn reject(pending_id: Uuid, db: &DatabaseConnection) -> Result<(), AppError> {
    let updated = pending_entity_resolution::Entity::update_many()
      .col_expr(
        pending_entity_resolution::Column::Status,
        Expr::value(ResolutionStatus::Merged.to_string()),
      )
      .col_expr(pending_entity_resolution::Column::ResolvedAt, Expr::value(Some(Utc::now())))
      .filter(pending_entity_resolution::Column::Id.eq(pending_id))
      .filter(pending_entity_resolution::Column::Status.eq(ResolutionStatus::Pending.to_string()))
      .exec(db)
      .await?;

    if updated.rows_affected == 0 {
      return Err(AppError::conflict("pending resolution is not pending"));
    }
    Ok(())
  }

  /// Create the identifier, mark the pending row resolved, and backfill
  /// participant and message links that carried only the raw identifier.
  async fn attach_identifier(
    identifier_type: &str,
    identifier_value: &str,
    entity_id: Uuid,
    resolution: Option<&str>,
    db: &DatabaseConnection,
  ) -> Result<(), AppError> {
    let txn = db.begin().await?;

    let identifier = entity_identifier::ActiveModel {
      id: Set(Uuid::new_v4()),
      entity_id: Set(entity_id),
      identifier_type: Set(identifier_type.to_owned()),
      identifier_value: Set(identifier_value.to_owned()),
      metadata: Set(None),
      created_at: Set(Utc::now().into()),
    };
    entity_identifier::Entity::insert(identifier)
      .on_conflict(
        OnConflict::columns([
          entity_identifier::Column::IdentifierType,
          entity_identifier::Column::IdentifierValue,
        ])
        .do_nothing()
        .to_owned(),
      )
      .exec_without_returning(&txn)
      .await?;

    pending_entity_resolution::Entity::update_many()
      .col_expr(
        pending_entity_resolution::Column::Status,
        Expr::value(ResolutionStatus::Resolved.to_string()),
      )
      .col_expr(pending_entity_resolution::Column::ResolvedEntityId, Expr::value(Some(entity_id)))
      .col_expr(
        pending_entity_resolution::Column::Resolution,
        Expr::value(resolution.map(ToOwned::to_owned)),
      )
      .col_expr(pending_entity_resolution::Column::ResolvedAt, Expr::value(Some(Utc::now())))
      .filter(pending_entity_resolution::Column::IdentifierType.eq(identifier_type))
      .filter(pending_entity_resolution::Column::IdentifierValue.eq(identifier_value))
      .exec(&txn)
      .await?;

    interaction_participant::Entity::update_many()
      .col_expr(interaction_participant::Column::EntityId, Expr::value(Some(entity_id)))
      .filter(interaction_participant::Column::EntityId.is_null())
      .filter(interaction_participant::Column::IdentifierType.eq(identifier_type))
      .filter(interaction_participant::Column::IdentifierValue.eq(identifier_value))
      .exec(&txn)
      .await?;

    message::Entity::update_many()
      .col_expr(message::Column::SenderEntityId, Expr::value(Some(entity_id)))
      .filter(message::Column::SenderEntityId.is_null())
      .filter(message::Column::SenderIdentifierType.eq(identifier_type))
      .filter(message::Column::SenderIdentifierValue.eq(identifier_value))
      .exec(&txn)
      .await?;

    txn.commit().await?;
    Ok(())
  }
}
