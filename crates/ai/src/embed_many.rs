use std::time::Duration;

use anyhow::anyhow;
use async_openai::{Client, config::OpenAIConfig, types::embeddings::CreateEmbeddingRequestArgs};
use plexus_shared::{APP_ENV, AppError, ErrorKind};
use sea_orm::prelude::PgVector;

use crate::embed_shared::process_embedding;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Embed a batch of inputs in one provider call, preserving input order.
pub async fn embed_many(inputs: &[String]) -> Result<Vec<PgVector>, AppError> {
  if inputs.is_empty() {
    return Ok(Vec::new());
  }

  let config = OpenAIConfig::new()
    .with_api_key(&APP_ENV.openai_api_key)
    .with_api_base(&APP_ENV.openai_base_url);

  let client = Client::with_config(config);

  let request = CreateEmbeddingRequestArgs::default()
    .model(&APP_ENV.embedding_model)
    .input(inputs.to_vec())
    .dimensions(APP_ENV.embedding_dim as u32)
    .build()
    .map_err(AppError::upstream)?;

  let response = tokio::time::timeout(EMBED_TIMEOUT, client.embeddings().create(request))
    .await
    .map_err(|_| AppError::new(ErrorKind::Upstream, anyhow!("embedding call timed out")))?
    .map_err(AppError::upstream)?;

  let mut data = response.data;
  data.sort_by_key(|e| e.index);

  if data.len() != inputs.len() {
    return Err(AppError::new(
      ErrorKind::Upstream,
      anyhow!("expected {} embeddings, got {}", inputs.len(), data.len()),
    ));
  }

  data
    .into_iter()
    .map(|e| process_embedding(e.embedding).map(PgVector::from))
    .collect()
}
