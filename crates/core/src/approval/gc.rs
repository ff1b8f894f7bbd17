use chrono::{DateTime, TimeDelta, Utc};
use plexus_entities::pending_approval;
use plexus_shared::{APP_ENV, AppError};
use sea_orm::{
  ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
  QueryOrder, QuerySelect, Statement, TransactionTrait,
};

use crate::types::{ApprovalStatus, ItemType};

/// Rows deleted per transaction.
const GC_BATCH_SIZE: u64 = 100;

/// Retention garbage collection, run daily.
///
/// Deletes rejected approvals past the retention window together with their
/// soft-deleted targets, then sweeps draft rows whose approval disappeared.
/// Targets already hard-deleted externally are tolerated.
pub async fn run_retention_gc(
  now: DateTime<Utc>,
  db: &DatabaseConnection,
) -> Result<u64, AppError> {
  let retention_days = APP_ENV.pending_approval_retention_days;
  let cutoff = now - TimeDelta::days(retention_days);
  let mut deleted_total = 0u64;

  // --- Rejected approvals past retention, with their targets.
  loop {
    let batch = pending_approval::Entity::find()
      .filter(pending_approval::Column::Status.eq(ApprovalStatus::Rejected.to_string()))
      .filter(pending_approval::Column::ReviewedAt.lt(cutoff))
      .order_by_asc(pending_approval::Column::ReviewedAt)
      .limit(GC_BATCH_SIZE)
      .all(db)
      .await?;

    if batch.is_empty() {
      break;
    }
    let batch_len = batch.len() as u64;

    let txn = db.begin().await?;
    for approval in batch {
      if let Ok(item_type) = approval.item_type.parse::<ItemType>() {
        item_type.spec().hard_delete(approval.target_id, &txn).await?;
      }
      pending_approval::Entity::delete_by_id(approval.id).exec(&txn).await?;
    }
    txn.commit().await?;

    deleted_total += batch_len;
    if batch_len < GC_BATCH_SIZE {
      break;
    }
  }

  // --- Abandoned drafts: draft-status rows with no backing approval.
  for (table, draft_status) in [
    ("entity_fact", "draft"),
    ("activity", "draft"),
    ("commitment", "draft"),
  ] {
    loop {
      let sql = format!(
        "DELETE FROM {table} WHERE id IN ( \
           SELECT t.id FROM {table} t \
           WHERE t.status = $1 AND t.created_at < $2 \
             AND NOT EXISTS (SELECT 1 FROM pending_approval a WHERE a.target_id = t.id) \
           LIMIT $3)"
      );
      let res = db
        .execute_raw(Statement::from_sql_and_values(
          DbBackend::Postgres,
          &sql,
          [draft_status.into(), cutoff.into(), (GC_BATCH_SIZE as i64).into()],
        ))
        .await?;

      deleted_total += res.rows_affected();
      if res.rows_affected() < GC_BATCH_SIZE {
        break;
      }
    }
  }

  if deleted_total > 0 {
    tracing::info!(deleted = deleted_total, retention_days, "Approval retention GC finished");
  }
  Ok(deleted_total)
}
