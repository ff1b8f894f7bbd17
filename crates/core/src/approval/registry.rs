use plexus_shared::AppError;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use uuid::Uuid;

use crate::types::ItemType;

/// Single source of truth mapping an approvable kind to its backing table and
/// status pair. Adding a new approvable kind is one more arm here.
#[derive(Debug, Clone, Copy)]
pub struct ItemTypeSpec {
  pub table: &'static str,
  pub draft_status: &'static str,
  pub active_status: &'static str,
}

impl ItemType {
  #[must_use]
  pub const fn spec(self) -> ItemTypeSpec {
    match self {
      Self::Fact => ItemTypeSpec {
        table: "entity_fact",
        draft_status: "draft",
        active_status: "active",
      },
      Self::Project | Self::Task => ItemTypeSpec {
        table: "activity",
        draft_status: "draft",
        active_status: "active",
      },
      // Approved commitments start life as pending work items.
      Self::Commitment => ItemTypeSpec {
        table: "commitment",
        draft_status: "draft",
        active_status: "pending",
      },
    }
  }
}

impl ItemTypeSpec {
  /// Flip the target from draft to its active value.
  /// Returns false when no draft row matched.
  pub async fn activate<C: ConnectionTrait>(
    &self,
    target_id: Uuid,
    db: &C,
  ) -> Result<bool, AppError> {
    let sql = format!(
      "UPDATE {} SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
      self.table
    );
    let res = db
      .execute_raw(Statement::from_sql_and_values(
        DbBackend::Postgres,
        &sql,
        [self.active_status.into(), target_id.into(), self.draft_status.into()],
      ))
      .await?;
    Ok(res.rows_affected() > 0)
  }

  /// Soft-delete the target. Tolerates a missing row.
  pub async fn soft_delete<C: ConnectionTrait>(
    &self,
    target_id: Uuid,
    db: &C,
  ) -> Result<(), AppError> {
    let sql = format!(
      "UPDATE {} SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
      self.table
    );
    db.execute_raw(Statement::from_sql_and_values(DbBackend::Postgres, &sql, [target_id.into()]))
      .await?;
    Ok(())
  }

  /// Hard-delete the target. Tolerates a row already removed externally.
  pub async fn hard_delete<C: ConnectionTrait>(
    &self,
    target_id: Uuid,
    db: &C,
  ) -> Result<(), AppError> {
    let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
    db.execute_raw(Statement::from_sql_and_values(DbBackend::Postgres, &sql, [target_id.into()]))
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registry_maps_every_kind() {
    assert_eq!(ItemType::Fact.spec().table, "entity_fact");
    assert_eq!(ItemType::Fact.spec().active_status, "active");
    assert_eq!(ItemType::Project.spec().table, "activity");
    assert_eq!(ItemType::Task.spec().table, "activity");
    // Approved commitments become pending, not active.
    assert_eq!(ItemType::Commitment.spec().active_status, "pending");
    assert_eq!(ItemType::Commitment.spec().draft_status, "draft");
  }
}
