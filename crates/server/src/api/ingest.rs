use apalis::prelude::TaskSink;
use axum::{Json, extract::State, http::StatusCode};
use plexus_core::IngestEnvelope;
use plexus_shared::AppError;
use plexus_worker::{EmbeddingJob, EmbeddingTarget};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
  pub interaction_id: Uuid,
  pub message_id: Uuid,
  /// False when the envelope was an idempotent replay.
  pub created: bool,
}

/// Ingest one normalized message envelope from a source adapter.
/// Idempotent by `(source, sourceMessageId)`.
#[utoipa::path(
  post,
  path = "/api/v1/ingest",
  responses(
    (status = 201, description = "Message stored", body = IngestResponse),
    (status = 200, description = "Duplicate envelope, already stored", body = IngestResponse),
    (status = 400, description = "Invalid envelope")
  )
)]
#[axum::debug_handler]
#[tracing::instrument(skip(state, payload), fields(source = %payload.source, chat_id = %payload.chat_id))]
pub async fn ingest(
  State(state): State<AppState>,
  Json(payload): Json<IngestEnvelope>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
  let outcome = state.assembler.ingest(payload, &state.db).await?;

  if outcome.message_created {
    let mut queue = state.storages.embedding.clone();
    queue
      .push(EmbeddingJob {
        target_kind: EmbeddingTarget::Message,
        target_id: outcome.message_id,
      })
      .await?;
  }

  let status = if outcome.message_created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((
    status,
    Json(IngestResponse {
      interaction_id: outcome.interaction_id,
      message_id: outcome.message_id,
      created: outcome.message_created,
    }),
  ))
}
