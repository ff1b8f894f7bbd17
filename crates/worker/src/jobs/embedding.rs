use std::time::Duration;

use chrono::Utc;
use plexus_ai::embed;
use plexus_entities::{activity, commitment, entity_fact, job_failure, message, topical_segment};
use plexus_shared::{APP_ENV, AppError};
use sea_orm::{
  ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter, Set,
  Statement, prelude::Expr,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Failed jobs kept per queue before pruning.
const FAILED_KEEP: i64 = 5000;

/// Initial retry backoff; doubles per attempt.
const BACKOFF_BASE: Duration = Duration::from_secs(1);

// ──────────────────────────────────────────────────
// Job definition
// ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingTarget {
  Message,
  Fact,
  Activity,
  Commitment,
  Segment,
  Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingJob {
  pub target_kind: EmbeddingTarget,
  pub target_id: Uuid,
}

// ──────────────────────────────────────────────────
// Job processing
// ──────────────────────────────────────────────────

/// Compute and store the embedding for one target row.
///
/// Retries retryable failures in-handler with exponential backoff; a terminal
/// failure lands in the `job_failure` dead-letter set. Writers simply
/// overwrite the embedding column, so at-least-once delivery is safe.
pub async fn process_embedding(
  job: EmbeddingJob,
  db: apalis::prelude::Data<DatabaseConnection>,
) -> Result<(), super::WorkerError> {
  let db = &*db;

  let Some(text) = target_text(&job, db).await? else {
    // Target gone (GC, rejection): nothing to embed.
    tracing::debug!(target = %job.target_id, kind = %job.target_kind, "Embedding target missing");
    return Ok(());
  };

  let mut attempt = 0u32;
  loop {
    match embed(&text).await {
      Ok(vector) => {
        write_embedding(&job, vector, db).await?;
        tracing::debug!(target = %job.target_id, kind = %job.target_kind, "Embedded target");
        return Ok(());
      }
      Err(err) if err.is_retryable() && attempt + 1 < APP_ENV.embedding_max_attempts => {
        attempt += 1;
        let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
        tracing::warn!(
          target = %job.target_id,
          attempt,
          delay_ms = delay.as_millis() as u64,
          error = %err,
          "Embedding failed, backing off"
        );
        tokio::time::sleep(delay).await;
      }
      Err(err) => {
        record_failure("embedding", &job, &err, db).await?;
        // Dead-lettered; do not bounce the job back to the queue.
        return Ok(());
      }
    }
  }
}

async fn target_text(
  job: &EmbeddingJob,
  db: &DatabaseConnection,
) -> Result<Option<String>, AppError> {
  let text = match job.target_kind {
    EmbeddingTarget::Message => message::Entity::find_by_id(job.target_id)
      .one(db)
      .await?
      .map(|m| m.content),
    EmbeddingTarget::Fact => entity_fact::Entity::find_by_id(job.target_id)
      .one(db)
      .await?
      .map(|f| f.value.unwrap_or(f.fact_type)),
    EmbeddingTarget::Activity => activity::Entity::find_by_id(job.target_id)
      .one(db)
      .await?
      .map(|a| a.name),
    EmbeddingTarget::Commitment => commitment::Entity::find_by_id(job.target_id)
      .one(db)
      .await?
      .map(|c| c.title),
    EmbeddingTarget::Segment => topical_segment::Entity::find_by_id(job.target_id)
      .one(db)
      .await?
      .map(|s| format!("{}\n{}", s.topic, s.keywords.join(", "))),
    EmbeddingTarget::Summary => topical_segment::Entity::find_by_id(job.target_id)
      .one(db)
      .await?
      .map(|s| s.summary),
  };

  Ok(text.filter(|t| !t.is_empty()))
}

async fn write_embedding(
  job: &EmbeddingJob,
  vector: sea_orm::prelude::PgVector,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  match job.target_kind {
    EmbeddingTarget::Message => {
      message::Entity::update_many()
        .col_expr(message::Column::Embedding, Expr::value(Some(vector)))
        .filter(message::Column::Id.eq(job.target_id))
        .exec(db)
        .await?;
    }
    EmbeddingTarget::Fact => {
      entity_fact::Entity::update_many()
        .col_expr(entity_fact::Column::Embedding, Expr::value(Some(vector)))
        .filter(entity_fact::Column::Id.eq(job.target_id))
        .exec(db)
        .await?;
    }
    EmbeddingTarget::Activity => {
      activity::Entity::update_many()
        .col_expr(activity::Column::Embedding, Expr::value(Some(vector)))
        .filter(activity::Column::Id.eq(job.target_id))
        .exec(db)
        .await?;
    }
    EmbeddingTarget::Commitment => {
      commitment::Entity::update_many()
        .col_expr(commitment::Column::Embedding, Expr::value(Some(vector)))
        .filter(commitment::Column::Id.eq(job.target_id))
        .exec(db)
        .await?;
    }
    EmbeddingTarget::Segment | EmbeddingTarget::Summary => {
      topical_segment::Entity::update_many()
        .col_expr(topical_segment::Column::Embedding, Expr::value(Some(vector)))
        .filter(topical_segment::Column::Id.eq(job.target_id))
        .exec(db)
        .await?;
    }
  }
  Ok(())
}

/// Record a terminal failure and prune the dead-letter set.
pub(crate) async fn record_failure<J: Serialize>(
  queue: &str,
  job: &J,
  err: &AppError,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  let row = job_failure::ActiveModel {
    id: Set(Uuid::new_v4()),
    queue: Set(queue.to_owned()),
    payload: Set(serde_json::to_value(job)?),
    error: Set(err.to_string()),
    failed_at: Set(Utc::now().into()),
  };
  job_failure::Entity::insert(row).exec_without_returning(db).await?;

  db.execute_raw(Statement::from_sql_and_values(
    DbBackend::Postgres,
    "DELETE FROM job_failure WHERE queue = $1 AND id NOT IN ( \
       SELECT id FROM job_failure WHERE queue = $1 \
       ORDER BY failed_at DESC LIMIT $2)",
    [queue.into(), FAILED_KEEP.into()],
  ))
  .await?;

  tracing::error!(queue, error = %err, "Job dead-lettered");
  Ok(())
}
