use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;
use plexus_entities::commitment;
use plexus_shared::AppError;
use sea_orm::{
  ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, ExprTrait,
  QueryFilter, Statement, prelude::Expr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::types::CommitmentStatus;

/// A commitment becomes overdue this long after its due date.
const OVERDUE_GRACE: TimeDelta = TimeDelta::hours(1);

pub struct ReminderEngine;

/// One reminder that fired during a scan; the worker turns it into a
/// notification.
#[derive(Debug, Clone, Serialize)]
pub struct DueReminder {
  pub commitment_id: Uuid,
  pub title: String,
  pub to_entity_id: Option<Uuid>,
  pub reminder_count: i32,
}

/// Compute the next reminder instant for a commitment.
///
/// Recurring commitments follow their cron rule. One-shot commitments remind
/// at due−24h, then due−1h, then hourly until the status leaves
/// pending/in_progress.
#[must_use]
pub fn next_reminder_at(
  due_date: DateTime<Utc>,
  now: DateTime<Utc>,
  recurrence_rule: Option<&str>,
) -> Option<DateTime<Utc>> {
  if let Some(rule) = recurrence_rule {
    let schedule = Schedule::from_str(rule).ok()?;
    return schedule.after(&now).next();
  }

  let day_before = due_date - TimeDelta::hours(24);
  let hour_before = due_date - TimeDelta::hours(1);

  if now < day_before {
    Some(day_before)
  } else if now < hour_before {
    Some(hour_before)
  } else {
    Some(now + TimeDelta::hours(1))
  }
}

impl ReminderEngine {
  /// Seed the reminder pointer when a commitment draft is approved.
  pub async fn initialize<C: ConnectionTrait>(
    commitment_id: Uuid,
    db: &C,
  ) -> Result<(), AppError> {
    let Some(model) = commitment::Entity::find_by_id(commitment_id).one(db).await? else {
      return Ok(());
    };

    let Some(due) = model.due_date else { return Ok(()) };
    let next = next_reminder_at(due.to_utc(), Utc::now(), model.recurrence_rule.as_deref());

    commitment::Entity::update_many()
      .col_expr(commitment::Column::NextReminderAt, Expr::value(next))
      .col_expr(commitment::Column::UpdatedAt, Expr::value(Utc::now()))
      .filter(commitment::Column::Id.eq(commitment_id))
      .exec(db)
      .await?;

    Ok(())
  }

  /// Collect commitments whose reminder is due, bump their counters, and
  /// advance the pointer. Runs every minute.
  pub async fn scan_due(
    now: DateTime<Utc>,
    db: &DatabaseConnection,
  ) -> Result<Vec<DueReminder>, AppError> {
    let live_statuses =
      [CommitmentStatus::Pending.to_string(), CommitmentStatus::InProgress.to_string()];

    let due = commitment::Entity::find()
      .filter(commitment::Column::DeletedAt.is_null())
      .filter(commitment::Column::NextReminderAt.lte(now))
      .filter(commitment::Column::Status.is_in(live_statuses))
      .all(db)
      .await?;

    let mut reminders = Vec::with_capacity(due.len());
    for model in due {
      let next = model
        .due_date
        .and_then(|d| next_reminder_at(d.to_utc(), now, model.recurrence_rule.as_deref()));

      commitment::Entity::update_many()
        .col_expr(
          commitment::Column::ReminderCount,
          Expr::col(commitment::Column::ReminderCount).add(1),
        )
        .col_expr(commitment::Column::NextReminderAt, Expr::value(next))
        .col_expr(commitment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(commitment::Column::Id.eq(model.id))
        .exec(db)
        .await?;

      reminders.push(DueReminder {
        commitment_id: model.id,
        title: model.title,
        to_entity_id: model.to_entity_id,
        reminder_count: model.reminder_count + 1,
      });
    }

    Ok(reminders)
  }

  /// Flip pending/in-progress commitments past due (plus grace) to overdue.
  /// Set-based and atomic.
  pub async fn mark_overdue(
    now: DateTime<Utc>,
    db: &DatabaseConnection,
  ) -> Result<u64, AppError> {
    let cutoff = now - OVERDUE_GRACE;
    let res = db
      .execute_raw(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "UPDATE commitment SET status = 'overdue', updated_at = NOW() \
         WHERE status IN ('pending', 'in_progress') \
           AND due_date < $1 \
           AND deleted_at IS NULL",
        [cutoff.into()],
      ))
      .await?;

    if res.rows_affected() > 0 {
      tracing::info!(flipped = res.rows_affected(), "Marked commitments overdue");
    }
    Ok(res.rows_affected())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
  }

  #[test]
  fn first_reminder_is_day_before() {
    let due = at(10, 12);
    assert_eq!(next_reminder_at(due, at(5, 12), None), Some(at(9, 12)));
  }

  #[test]
  fn second_reminder_is_hour_before() {
    let due = at(10, 12);
    assert_eq!(next_reminder_at(due, at(9, 13), None), Some(at(10, 11)));
  }

  #[test]
  fn then_hourly() {
    let due = at(10, 12);
    let now = at(10, 11) + TimeDelta::minutes(30);
    assert_eq!(next_reminder_at(due, now, None), Some(now + TimeDelta::hours(1)));
  }

  #[test]
  fn past_due_keeps_reminding_hourly() {
    let due = at(10, 12);
    let now = at(11, 9);
    assert_eq!(next_reminder_at(due, now, None), Some(now + TimeDelta::hours(1)));
  }

  #[test]
  fn recurring_follows_cron_rule() {
    // Daily at 09:00 (cron crate: sec min hour dom mon dow).
    let due = at(10, 12);
    let next = next_reminder_at(due, at(5, 10), Some("0 0 9 * * *"));
    assert_eq!(next, Some(at(6, 9)));
  }

  #[test]
  fn invalid_cron_rule_yields_none() {
    assert_eq!(next_reminder_at(at(10, 12), at(5, 10), Some("not a rule")), None);
  }
}
