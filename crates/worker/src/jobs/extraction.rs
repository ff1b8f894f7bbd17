use std::time::Duration;

use plexus_core::Orchestrator;
use plexus_core::extraction::MAX_EXTRACTION_ATTEMPTS;
use plexus_entities::topical_segment;
use plexus_shared::ErrorKind;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkerError;

// ──────────────────────────────────────────────────
// Job definition
// ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSegmentJob {
  pub segment_id: Uuid,
  /// Reprocess even if the segment was already extracted.
  pub force: bool,
}

// ──────────────────────────────────────────────────
// Job processing
// ──────────────────────────────────────────────────

/// Run LLM extraction for one segment. The orchestrator tracks attempts on
/// the segment row; retryable failures below the cap bounce back to the
/// queue after a backoff proportional to the attempt count.
pub async fn process_extraction(
  job: ExtractSegmentJob,
  db: apalis::prelude::Data<DatabaseConnection>,
) -> Result<(), WorkerError> {
  let db = &*db;

  match Orchestrator::process_segment(job.segment_id, job.force, db).await {
    Ok(()) => Ok(()),
    // Idempotency guard tripped: already processed or a live batch exists.
    Err(err) if err.kind() == ErrorKind::Conflict => {
      tracing::debug!(segment_id = %job.segment_id, "Extraction skipped: {err}");
      Ok(())
    }
    Err(err) if err.is_retryable() => {
      let attempts = topical_segment::Entity::find_by_id(job.segment_id)
        .one(db)
        .await
        .ok()
        .flatten()
        .map_or(0, |s| s.extraction_attempts);

      if attempts >= MAX_EXTRACTION_ATTEMPTS {
        super::record_failure("extraction", &job, &err, db).await?;
        return Ok(());
      }

      let delay = Duration::from_secs(1u64 << attempts.clamp(0, 6) as u32);
      tracing::warn!(
        segment_id = %job.segment_id,
        attempts,
        delay_s = delay.as_secs(),
        error = %err,
        "Extraction failed, will retry"
      );
      tokio::time::sleep(delay).await;
      Err(err.into())
    }
    Err(err) => {
      super::record_failure("extraction", &job, &err, db).await?;
      Ok(())
    }
  }
}
