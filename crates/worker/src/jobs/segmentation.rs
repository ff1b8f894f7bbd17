use apalis::prelude::TaskSink;
use apalis_postgres::PostgresStorage;
use plexus_core::Segmenter;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EmbeddingJob, EmbeddingTarget, ExtractSegmentJob, WorkerError};

// ──────────────────────────────────────────────────
// Job definition
// ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentInteractionJob {
  pub interaction_id: Uuid,
}

// ──────────────────────────────────────────────────
// Job processing
// ──────────────────────────────────────────────────

/// Segment one settled interaction, then fan out extraction and embedding
/// jobs for the new segments.
pub async fn process_segmentation(
  job: SegmentInteractionJob,
  db: apalis::prelude::Data<DatabaseConnection>,
  extraction_storage: apalis::prelude::Data<PostgresStorage<ExtractSegmentJob>>,
  embedding_storage: apalis::prelude::Data<PostgresStorage<EmbeddingJob>>,
) -> Result<(), WorkerError> {
  let db = &*db;

  let segment_ids = match Segmenter::segment_interaction(job.interaction_id, db).await {
    Ok(ids) => ids,
    Err(err) if err.is_retryable() => {
      // Bounce back to the queue; apalis re-delivers.
      return Err(err.into());
    }
    Err(err) => {
      super::record_failure("segmentation", &job, &err, db).await?;
      return Ok(());
    }
  };

  for segment_id in segment_ids {
    let mut extraction = (*extraction_storage).clone();
    extraction
      .push(ExtractSegmentJob { segment_id, force: false })
      .await
      .map_err(plexus_shared::AppError::from)?;

    let mut embedding = (*embedding_storage).clone();
    embedding
      .push(EmbeddingJob { target_kind: EmbeddingTarget::Summary, target_id: segment_id })
      .await
      .map_err(plexus_shared::AppError::from)?;
  }

  Ok(())
}
