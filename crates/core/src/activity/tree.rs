use chrono::{DateTime, Utc};
use plexus_entities::{activity, activity_closure};
use plexus_shared::AppError;
use sea_orm::{
  ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait, QueryFilter, Set,
  Statement, prelude::{Expr, PgVector},
};
use uuid::Uuid;

use crate::types::{ActivityStatus, ActivityType};

/// Container adopting orphaned tasks that cannot be placed anywhere else.
pub const UNSORTED_CONTAINER_NAME: &str = "Unsorted Tasks";

/// Path of a child under a parent: slash-joined ancestor ids.
pub(crate) fn child_path(parent_path: &str, parent_id: Uuid) -> String {
  format!("{parent_path}/{parent_id}")
}

pub struct ActivityTree;

impl ActivityTree {
  /// Exact-name lookup among live activities, newest first.
  pub async fn find_by_name<C: ConnectionTrait>(
    name: &str,
    db: &C,
  ) -> Result<Option<Uuid>, AppError> {
    Ok(
      activity::Entity::find()
        .filter(activity::Column::Name.eq(name))
        .filter(activity::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .map(|a| a.id),
    )
  }

  /// Insert a draft activity under `parent_id` (or at the root), maintaining
  /// depth, materialized path, and the closure table in the same transaction
  /// the caller holds.
  #[allow(clippy::too_many_arguments)]
  pub async fn create_draft<C: ConnectionTrait>(
    name: &str,
    activity_type: ActivityType,
    parent_id: Option<Uuid>,
    owner_entity_id: Uuid,
    client_entity_id: Option<Uuid>,
    due_date: Option<DateTime<Utc>>,
    needs_review: bool,
    review_reason: Option<String>,
    metadata: Option<serde_json::Value>,
    embedding: Option<PgVector>,
    db: &C,
  ) -> Result<Uuid, AppError> {
    Self::insert(
      name,
      activity_type,
      ActivityStatus::Draft,
      parent_id,
      owner_entity_id,
      client_entity_id,
      due_date,
      needs_review,
      review_reason,
      metadata,
      embedding,
      db,
    )
    .await
  }

  #[allow(clippy::too_many_arguments)]
  async fn insert<C: ConnectionTrait>(
    name: &str,
    activity_type: ActivityType,
    status: ActivityStatus,
    parent_id: Option<Uuid>,
    owner_entity_id: Uuid,
    client_entity_id: Option<Uuid>,
    due_date: Option<DateTime<Utc>>,
    needs_review: bool,
    review_reason: Option<String>,
    metadata: Option<serde_json::Value>,
    embedding: Option<PgVector>,
    db: &C,
  ) -> Result<Uuid, AppError> {
    let (depth, path) = match parent_id {
      Some(pid) => {
        let parent = activity::Entity::find_by_id(pid)
          .filter(activity::Column::DeletedAt.is_null())
          .one(db)
          .await?
          .ok_or_else(|| AppError::not_found(format!("parent activity {pid} not found")))?;
        (parent.depth + 1, child_path(&parent.materialized_path, parent.id))
      }
      None => (0, String::new()),
    };

    let id = Uuid::new_v4();
    let now = Utc::now();
    let model = activity::ActiveModel {
      id: Set(id),
      name: Set(name.to_owned()),
      activity_type: Set(activity_type.to_string()),
      status: Set(status.to_string()),
      priority: Set(None),
      context: Set(None),
      parent_id: Set(parent_id),
      depth: Set(depth),
      materialized_path: Set(path),
      owner_entity_id: Set(Some(owner_entity_id)),
      client_entity_id: Set(client_entity_id),
      start_date: Set(None),
      due_date: Set(due_date.map(Into::into)),
      completed_at: Set(None),
      tags: Set(Vec::new()),
      needs_review: Set(needs_review),
      review_reason: Set(review_reason),
      confirmation_count: Set(0),
      metadata: Set(metadata),
      embedding: Set(embedding),
      created_at: Set(now.into()),
      updated_at: Set(now.into()),
      deleted_at: Set(None),
    };
    activity::Entity::insert(model).exec_without_returning(db).await?;

    // Closure rows: self plus one per ancestor of the parent.
    let self_row = activity_closure::ActiveModel {
      ancestor_id: Set(id),
      descendant_id: Set(id),
      depth: Set(0),
    };
    activity_closure::Entity::insert(self_row).exec_without_returning(db).await?;

    if let Some(pid) = parent_id {
      db.execute_raw(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "INSERT INTO activity_closure (ancestor_id, descendant_id, depth) \
         SELECT ancestor_id, $1, depth + 1 \
         FROM activity_closure WHERE descendant_id = $2",
        [id.into(), pid.into()],
      ))
      .await?;
    }

    Ok(id)
  }

  /// Move `id` under `new_parent_id` (or to the root), atomically updating
  /// parent pointer, depth, materialized path, and closure rows for the whole
  /// subtree. Must run inside a transaction.
  pub async fn set_parent<C: ConnectionTrait>(
    id: Uuid,
    new_parent_id: Option<Uuid>,
    db: &C,
  ) -> Result<(), AppError> {
    let node = activity::Entity::find_by_id(id)
      .filter(activity::Column::DeletedAt.is_null())
      .one(db)
      .await?
      .ok_or_else(|| AppError::not_found(format!("activity {id} not found")))?;

    let (new_depth, new_path) = match new_parent_id {
      Some(pid) => {
        if pid == id {
          return Err(AppError::validation("activity cannot be its own parent"));
        }
        // Reject cycles: the new parent must not live in the subtree.
        let in_subtree = activity_closure::Entity::find()
          .filter(activity_closure::Column::AncestorId.eq(id))
          .filter(activity_closure::Column::DescendantId.eq(pid))
          .count(db)
          .await?
          > 0;
        if in_subtree {
          return Err(AppError::validation("cannot move an activity under its own descendant"));
        }

        let parent = activity::Entity::find_by_id(pid)
          .filter(activity::Column::DeletedAt.is_null())
          .one(db)
          .await?
          .ok_or_else(|| AppError::not_found(format!("parent activity {pid} not found")))?;
        (parent.depth + 1, child_path(&parent.materialized_path, parent.id))
      }
      None => (0, String::new()),
    };

    let depth_delta = new_depth - node.depth;
    let old_prefix = node.materialized_path.clone();

    // Rewrite path + depth across the subtree in one statement.
    db.execute_raw(Statement::from_sql_and_values(
      DbBackend::Postgres,
      "UPDATE activity \
       SET materialized_path = $1 || substr(materialized_path, length($2) + 1), \
           depth = depth + $3, \
           updated_at = NOW() \
       WHERE id IN (SELECT descendant_id FROM activity_closure WHERE ancestor_id = $4)",
      [new_path.clone().into(), old_prefix.into(), depth_delta.into(), id.into()],
    ))
    .await?;

    // Detach the subtree from its old ancestors.
    db.execute_raw(Statement::from_sql_and_values(
      DbBackend::Postgres,
      "DELETE FROM activity_closure \
       WHERE descendant_id IN (SELECT descendant_id FROM activity_closure WHERE ancestor_id = $1) \
         AND ancestor_id NOT IN (SELECT descendant_id FROM activity_closure WHERE ancestor_id = $1)",
      [id.into()],
    ))
    .await?;

    // Attach it under the new ancestors.
    if let Some(pid) = new_parent_id {
      db.execute_raw(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "INSERT INTO activity_closure (ancestor_id, descendant_id, depth) \
         SELECT supertree.ancestor_id, subtree.descendant_id, \
                supertree.depth + subtree.depth + 1 \
         FROM activity_closure AS supertree \
         CROSS JOIN activity_closure AS subtree \
         WHERE supertree.descendant_id = $1 AND subtree.ancestor_id = $2",
        [pid.into(), id.into()],
      ))
      .await?;
    }

    activity::Entity::update_many()
      .col_expr(activity::Column::ParentId, Expr::value(new_parent_id))
      .col_expr(activity::Column::UpdatedAt, Expr::value(Utc::now()))
      .filter(activity::Column::Id.eq(id))
      .exec(db)
      .await?;

    Ok(())
  }

  /// Find or create the owner's "Unsorted Tasks" fallback project.
  pub async fn ensure_unsorted_container<C: ConnectionTrait>(
    owner_entity_id: Uuid,
    db: &C,
  ) -> Result<Uuid, AppError> {
    let existing = activity::Entity::find()
      .filter(activity::Column::Name.eq(UNSORTED_CONTAINER_NAME))
      .filter(activity::Column::OwnerEntityId.eq(owner_entity_id))
      .filter(activity::Column::DeletedAt.is_null())
      .one(db)
      .await?;

    if let Some(container) = existing {
      return Ok(container.id);
    }

    Self::insert(
      UNSORTED_CONTAINER_NAME,
      ActivityType::Project,
      ActivityStatus::Active,
      None,
      owner_entity_id,
      None,
      None,
      false,
      None,
      None,
      None,
      db,
    )
    .await
  }

  /// Ids of every descendant of `id` (excluding itself).
  pub async fn descendants<C: ConnectionTrait>(id: Uuid, db: &C) -> Result<Vec<Uuid>, AppError> {
    Ok(
      activity_closure::Entity::find()
        .filter(activity_closure::Column::AncestorId.eq(id))
        .filter(activity_closure::Column::DescendantId.ne(id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.descendant_id)
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn child_path_appends_parent_id() {
    let parent = Uuid::new_v4();
    assert_eq!(child_path("", parent), format!("/{parent}"));

    let grandparent = Uuid::new_v4();
    let base = format!("/{grandparent}");
    assert_eq!(child_path(&base, parent), format!("/{grandparent}/{parent}"));
  }
}
