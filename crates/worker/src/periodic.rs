use std::time::Duration;

use apalis::prelude::TaskSink;
use chrono::{Local, Timelike, Utc};
use plexus_core::{Auditor, Orchestrator, ReminderEngine, Segmenter, run_retention_gc};
use plexus_shared::AppError;
use sea_orm::DatabaseConnection;

use crate::JobStorages;
use crate::jobs::{ExtractSegmentJob, NotificationJob, SegmentInteractionJob};

/// Local hour at which retention GC runs.
const GC_HOUR: u32 = 3;

/// Local hour at which the daily data-quality audit runs.
const AUDIT_HOUR: u32 = 4;

/// How often the pipeline scans for settled interactions and retryable
/// segments.
const PIPELINE_SCAN: Duration = Duration::from_secs(300);

/// Run all periodic tasks until shutdown. Individual tick failures are
/// logged, not fatal; the queue's retry discipline covers the rest.
pub async fn run(db: DatabaseConnection, storages: JobStorages) -> Result<(), AppError> {
  tokio::try_join!(
    minute_scan(db.clone(), storages.clone()),
    pipeline_scan(db.clone(), storages),
    daily_tasks(db),
  )?;
  Ok(())
}

/// Every minute: fire due reminders and flip overdue commitments.
async fn minute_scan(db: DatabaseConnection, storages: JobStorages) -> Result<(), AppError> {
  let mut interval = tokio::time::interval(Duration::from_secs(60));
  interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

  loop {
    interval.tick().await;
    let now = Utc::now();

    match ReminderEngine::scan_due(now, &db).await {
      Ok(reminders) => {
        for reminder in reminders {
          let mut queue = storages.notification.clone();
          let job = NotificationJob {
            commitment_id: reminder.commitment_id,
            title: reminder.title,
            to_entity_id: reminder.to_entity_id,
            reminder_count: reminder.reminder_count,
          };
          if let Err(err) = queue.push(job).await {
            tracing::warn!(error = %err, "Failed to enqueue notification");
          }
        }
      }
      Err(err) => tracing::warn!(error = %err, "Reminder scan failed"),
    }

    if let Err(err) = ReminderEngine::mark_overdue(now, &db).await {
      tracing::warn!(error = %err, "Overdue scan failed");
    }
  }
}

/// Every few minutes: enqueue segmentation for settled interactions and
/// extraction for unprocessed or retryable segments.
async fn pipeline_scan(db: DatabaseConnection, storages: JobStorages) -> Result<(), AppError> {
  let mut interval = tokio::time::interval(PIPELINE_SCAN);
  interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

  loop {
    interval.tick().await;

    match Segmenter::pending_interactions(&db).await {
      Ok(interaction_ids) => {
        for interaction_id in interaction_ids {
          let mut queue = storages.segmentation.clone();
          if let Err(err) = queue.push(SegmentInteractionJob { interaction_id }).await {
            tracing::warn!(error = %err, "Failed to enqueue segmentation");
          }
        }
      }
      Err(err) => tracing::warn!(error = %err, "Segmentation scan failed"),
    }

    match Orchestrator::pending_segments(&db).await {
      Ok(segment_ids) => {
        for segment_id in segment_ids {
          let mut queue = storages.extraction.clone();
          if let Err(err) = queue.push(ExtractSegmentJob { segment_id, force: false }).await {
            tracing::warn!(error = %err, "Failed to enqueue extraction");
          }
        }
      }
      Err(err) => tracing::warn!(error = %err, "Extraction scan failed"),
    }
  }
}

/// Completed queue jobs kept for inspection.
const COMPLETED_KEEP: i64 = 1000;

/// Trim the queue backend's completed-job history. Best effort: the table
/// belongs to apalis, so failures only log.
async fn prune_completed_jobs(db: &DatabaseConnection) {
  use sea_orm::{ConnectionTrait, DbBackend, Statement};

  let result = db
    .execute_raw(Statement::from_sql_and_values(
      DbBackend::Postgres,
      "DELETE FROM apalis.jobs WHERE status = 'Done' AND id NOT IN ( \
         SELECT id FROM apalis.jobs WHERE status = 'Done' \
         ORDER BY done_at DESC LIMIT $1)",
      [COMPLETED_KEEP.into()],
    ))
    .await;

  if let Err(err) = result {
    tracing::debug!(error = %err, "Completed-job prune skipped");
  }
}

/// Once per local day: retention GC at 03:00, audit at 04:00.
async fn daily_tasks(db: DatabaseConnection) -> Result<(), AppError> {
  let mut interval = tokio::time::interval(Duration::from_secs(60));
  interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

  let mut last_gc_day = None;
  let mut last_audit_day = None;

  loop {
    interval.tick().await;
    let now_local = Local::now();
    let today = now_local.date_naive();

    if now_local.hour() == GC_HOUR && last_gc_day != Some(today) {
      last_gc_day = Some(today);
      if let Err(err) = run_retention_gc(Utc::now(), &db).await {
        tracing::warn!(error = %err, "Retention GC failed");
      }
      prune_completed_jobs(&db).await;
    }

    if now_local.hour() == AUDIT_HOUR && last_audit_day != Some(today) {
      last_audit_day = Some(today);
      if let Err(err) = Auditor::run_audit(&db).await {
        tracing::warn!(error = %err, "Daily audit failed");
      }
    }
  }
}
