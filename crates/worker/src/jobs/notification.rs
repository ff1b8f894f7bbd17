use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkerError;

// ──────────────────────────────────────────────────
// Job definition
// ──────────────────────────────────────────────────

/// A reminder that fired; delivery channels (bot, push) consume this queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
  pub commitment_id: Uuid,
  pub title: String,
  pub to_entity_id: Option<Uuid>,
  pub reminder_count: i32,
}

// ──────────────────────────────────────────────────
// Job processing
// ──────────────────────────────────────────────────

/// Hand the notification to the delivery side. The core only records that the
/// reminder fired; actual transport lives in the source adapters.
pub async fn process_notification(
  job: NotificationJob,
  _db: apalis::prelude::Data<DatabaseConnection>,
) -> Result<(), WorkerError> {
  tracing::info!(
    commitment_id = %job.commitment_id,
    title = %job.title,
    reminder_count = job.reminder_count,
    "Commitment reminder due"
  );
  Ok(())
}
