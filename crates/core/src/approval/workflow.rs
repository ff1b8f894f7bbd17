use chrono::Utc;
use plexus_entities::pending_approval;
use plexus_shared::{APP_ENV, AppError};
use sea_orm::{
  ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait,
  PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
  prelude::Expr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commitment::ReminderEngine;
use crate::types::{ApprovalStatus, ItemType};

pub struct ApprovalWorkflow;

#[derive(Debug, Clone, Copy)]
enum BatchAction {
  Approve,
  Reject,
}

/// Per-item outcomes of a batch operation. A failing item is isolated; its
/// siblings still go through.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
  pub processed: u64,
  pub failed: u64,
  pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchStats {
  pub pending: u64,
  pub approved: u64,
  pub rejected: u64,
}

/// Editable draft fields. `parent_id` is deliberately absent: reparenting
/// needs closure-table maintenance and must go through the activity service
/// after approval.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDraft {
  pub name: Option<String>,
  pub description: Option<String>,
  pub priority: Option<i32>,
  pub due_date: Option<chrono::DateTime<Utc>>,
}

impl ApprovalWorkflow {
  /// Approve one pending draft: flip the target to its active status and the
  /// approval to `approved`. A second call returns Conflict.
  pub async fn approve(id: Uuid, db: &DatabaseConnection) -> Result<(), AppError> {
    let txn = db.begin().await?;
    Self::approve_locked(id, &txn).await?;
    txn.commit().await?;
    Ok(())
  }

  async fn approve_locked(id: Uuid, txn: &DatabaseTransaction) -> Result<(), AppError> {
    let approval = lock_approval(id, txn).await?;

    if approval.status != ApprovalStatus::Pending.to_string() {
      return Err(AppError::conflict(format!("approval {id} is not pending")));
    }

    let item_type: ItemType = approval
      .item_type
      .parse()
      .map_err(|_| AppError::fatal(format!("unknown item type {}", approval.item_type)))?;

    let activated = item_type.spec().activate(approval.target_id, txn).await?;
    if !activated {
      return Err(AppError::not_found(format!(
        "draft {} for approval {id} not found",
        approval.target_id
      )));
    }

    // Activated commitments enter the reminder schedule.
    if item_type == ItemType::Commitment {
      ReminderEngine::initialize(approval.target_id, txn).await?;
    }

    pending_approval::Entity::update_many()
      .col_expr(
        pending_approval::Column::Status,
        Expr::value(ApprovalStatus::Approved.to_string()),
      )
      .col_expr(pending_approval::Column::ReviewedAt, Expr::value(Some(Utc::now())))
      .filter(pending_approval::Column::Id.eq(id))
      .exec(txn)
      .await?;

    tracing::info!(approval_id = %id, item_type = %item_type, "Approved draft");
    Ok(())
  }

  /// Reject one pending draft. With retention configured the target is
  /// soft-deleted and garbage-collected later; with `retention_days = 0` both
  /// rows are removed immediately.
  pub async fn reject(id: Uuid, db: &DatabaseConnection) -> Result<(), AppError> {
    let txn = db.begin().await?;
    Self::reject_locked(id, &txn).await?;
    txn.commit().await?;
    Ok(())
  }

  async fn reject_locked(id: Uuid, txn: &DatabaseTransaction) -> Result<(), AppError> {
    let approval = lock_approval(id, txn).await?;

    if approval.status != ApprovalStatus::Pending.to_string() {
      return Err(AppError::conflict(format!("approval {id} is not pending")));
    }

    let item_type: ItemType = approval
      .item_type
      .parse()
      .map_err(|_| AppError::fatal(format!("unknown item type {}", approval.item_type)))?;

    if APP_ENV.pending_approval_retention_days == 0 {
      item_type.spec().hard_delete(approval.target_id, txn).await?;
      pending_approval::Entity::delete_by_id(id).exec(txn).await?;
    } else {
      item_type.spec().soft_delete(approval.target_id, txn).await?;
      pending_approval::Entity::update_many()
        .col_expr(
          pending_approval::Column::Status,
          Expr::value(ApprovalStatus::Rejected.to_string()),
        )
        .col_expr(pending_approval::Column::ReviewedAt, Expr::value(Some(Utc::now())))
        .filter(pending_approval::Column::Id.eq(id))
        .exec(txn)
        .await?;
    }

    tracing::info!(approval_id = %id, item_type = %item_type, "Rejected draft");
    Ok(())
  }

  /// Approve every pending approval in a batch. Runs in one transaction with
  /// a savepoint per item so one bad draft cannot sink its siblings.
  pub async fn batch_approve(
    batch_id: Uuid,
    db: &DatabaseConnection,
  ) -> Result<BatchOutcome, AppError> {
    Self::batch_op(batch_id, db, BatchAction::Approve).await
  }

  pub async fn batch_reject(
    batch_id: Uuid,
    db: &DatabaseConnection,
  ) -> Result<BatchOutcome, AppError> {
    Self::batch_op(batch_id, db, BatchAction::Reject).await
  }

  async fn batch_op(
    batch_id: Uuid,
    db: &DatabaseConnection,
    action: BatchAction,
  ) -> Result<BatchOutcome, AppError> {
    let txn = db.begin().await?;

    let ids: Vec<Uuid> = pending_approval::Entity::find()
      .filter(pending_approval::Column::BatchId.eq(batch_id))
      .filter(pending_approval::Column::Status.eq(ApprovalStatus::Pending.to_string()))
      .order_by_asc(pending_approval::Column::CreatedAt)
      .all(&txn)
      .await?
      .into_iter()
      .map(|a| a.id)
      .collect();

    let mut outcome = BatchOutcome::default();
    for id in ids {
      let savepoint = txn.begin().await?;
      let result = match action {
        BatchAction::Approve => Self::approve_locked(id, &savepoint).await,
        BatchAction::Reject => Self::reject_locked(id, &savepoint).await,
      };
      match result {
        Ok(()) => {
          savepoint.commit().await?;
          outcome.processed += 1;
        }
        Err(err) => {
          savepoint.rollback().await?;
          outcome.failed += 1;
          outcome.errors.push(format!("{id}: {err}"));
        }
      }
    }

    txn.commit().await?;
    Ok(outcome)
  }

  /// Edit a draft's editable fields before approval.
  pub async fn update_target(
    id: Uuid,
    update: UpdateDraft,
    db: &DatabaseConnection,
  ) -> Result<(), AppError> {
    let txn = db.begin().await?;
    let approval = lock_approval(id, &txn).await?;

    if approval.status != ApprovalStatus::Pending.to_string() {
      return Err(AppError::conflict(format!("approval {id} is not pending")));
    }

    let item_type: ItemType = approval
      .item_type
      .parse()
      .map_err(|_| AppError::fatal(format!("unknown item type {}", approval.item_type)))?;

    let sql = match item_type {
      ItemType::Fact => {
        "UPDATE entity_fact SET value = COALESCE($2, value), updated_at = NOW() \
         WHERE id = $1 AND status = 'draft'"
      }
      ItemType::Project | ItemType::Task => {
        "UPDATE activity SET name = COALESCE($2, name), context = COALESCE($3, context), \
                priority = COALESCE($4, priority), due_date = COALESCE($5, due_date), \
                updated_at = NOW() \
         WHERE id = $1 AND status = 'draft'"
      }
      ItemType::Commitment => {
        "UPDATE commitment SET title = COALESCE($2, title), \
                description = COALESCE($3, description), due_date = COALESCE($5, due_date), \
                updated_at = NOW() \
         WHERE id = $1 AND status = 'draft'"
      }
    };

    let values: Vec<sea_orm::Value> = match item_type {
      ItemType::Fact => vec![approval.target_id.into(), update.name.into()],
      _ => vec![
        approval.target_id.into(),
        update.name.into(),
        update.description.into(),
        update.priority.into(),
        update.due_date.into(),
      ],
    };

    let res = txn
      .execute_raw(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
      .await?;
    if res.rows_affected() == 0 {
      return Err(AppError::not_found(format!("draft {} not found", approval.target_id)));
    }

    txn.commit().await?;
    Ok(())
  }

  pub async fn batch_stats(
    batch_id: Uuid,
    db: &DatabaseConnection,
  ) -> Result<BatchStats, AppError> {
    let count = |status: ApprovalStatus| {
      pending_approval::Entity::find()
        .filter(pending_approval::Column::BatchId.eq(batch_id))
        .filter(pending_approval::Column::Status.eq(status.to_string()))
        .count(db)
    };

    Ok(BatchStats {
      pending: count(ApprovalStatus::Pending).await?,
      approved: count(ApprovalStatus::Approved).await?,
      rejected: count(ApprovalStatus::Rejected).await?,
    })
  }

  pub async fn list(
    batch_id: Option<Uuid>,
    status: Option<ApprovalStatus>,
    limit: u64,
    offset: u64,
    db: &DatabaseConnection,
  ) -> Result<Vec<pending_approval::Model>, AppError> {
    let mut query = pending_approval::Entity::find();
    if let Some(batch_id) = batch_id {
      query = query.filter(pending_approval::Column::BatchId.eq(batch_id));
    }
    if let Some(status) = status {
      query = query.filter(pending_approval::Column::Status.eq(status.to_string()));
    }
    let limit = if limit == 0 { 50 } else { limit.min(200) };
    Ok(
      query
        .order_by_desc(pending_approval::Column::CreatedAt)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?,
    )
  }
}

/// `SELECT ... FOR UPDATE` on the approval row; serializes concurrent
/// operators on the same item.
async fn lock_approval(
  id: Uuid,
  txn: &DatabaseTransaction,
) -> Result<pending_approval::Model, AppError> {
  pending_approval::Entity::find_by_id(id)
    .lock_exclusive()
    .one(txn)
    .await?
    .ok_or_else(|| AppError::not_found(format!("approval {id} not found")))
}
