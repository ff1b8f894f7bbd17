use std::time::Duration;

use anyhow::anyhow;
use async_openai::{Client, config::OpenAIConfig, types::embeddings::CreateEmbeddingRequestArgs};
use plexus_shared::{APP_ENV, AppError, ErrorKind};
use sea_orm::prelude::PgVector;

use crate::embed_shared::process_embedding;

/// Hard timeout for a single embedding call.
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn embed(input: &str) -> Result<PgVector, AppError> {
  let config = OpenAIConfig::new()
    .with_api_key(&APP_ENV.openai_api_key)
    .with_api_base(&APP_ENV.openai_base_url);

  let client = Client::with_config(config);

  let request = CreateEmbeddingRequestArgs::default()
    .model(&APP_ENV.embedding_model)
    .input(input)
    .dimensions(APP_ENV.embedding_dim as u32)
    .build()
    .map_err(AppError::upstream)?;

  let response = tokio::time::timeout(EMBED_TIMEOUT, client.embeddings().create(request))
    .await
    .map_err(|_| AppError::new(ErrorKind::Upstream, anyhow!("embedding call timed out")))?
    .map_err(AppError::upstream)?;

  let embedding = response
    .data
    .into_iter()
    .map(|e| e.embedding)
    .next()
    .ok_or_else(|| AppError::new(ErrorKind::Upstream, anyhow!("empty embedding")))?;

  let processed = process_embedding(embedding)?;
  Ok(PgVector::from(processed))
}
