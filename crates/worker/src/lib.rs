use std::time::Duration;

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_postgres::PostgresStorage;
use plexus_shared::AppError;
use sea_orm::DatabaseConnection;

pub mod jobs;
pub use jobs::{
  EmbeddingJob, EmbeddingTarget, ExtractSegmentJob, NotificationJob, SegmentInteractionJob,
  WorkerError,
};

mod periodic;

/// One Postgres-backed queue per job kind, shared with the HTTP surface.
#[derive(Clone)]
pub struct JobStorages {
  pub embedding: PostgresStorage<EmbeddingJob>,
  pub segmentation: PostgresStorage<SegmentInteractionJob>,
  pub extraction: PostgresStorage<ExtractSegmentJob>,
  pub notification: PostgresStorage<NotificationJob>,
}

impl JobStorages {
  #[must_use]
  pub fn new(pool: &sea_orm::sqlx::PgPool) -> Self {
    Self {
      embedding: PostgresStorage::new(pool),
      segmentation: PostgresStorage::new(pool),
      extraction: PostgresStorage::new(pool),
      notification: PostgresStorage::new(pool),
    }
  }
}

/// Run the queue consumers and the periodic scans until shutdown.
pub async fn worker(db: &DatabaseConnection, storages: JobStorages) -> Result<(), AppError> {
  let monitor = Monitor::new()
    .register({
      WorkerBuilder::new("plexus-embedding")
        .data(db.clone())
        .backend(storages.embedding.clone())
        .build_fn(jobs::process_embedding)
    })
    .register({
      WorkerBuilder::new("plexus-segmentation")
        .data(db.clone())
        .data(storages.extraction.clone())
        .data(storages.embedding.clone())
        .backend(storages.segmentation.clone())
        .build_fn(jobs::process_segmentation)
    })
    .register({
      WorkerBuilder::new("plexus-extraction")
        .data(db.clone())
        .backend(storages.extraction.clone())
        .build_fn(jobs::process_extraction)
    })
    .register({
      WorkerBuilder::new("plexus-notification")
        .data(db.clone())
        .backend(storages.notification.clone())
        .build_fn(jobs::process_notification)
    })
    .shutdown_timeout(Duration::from_secs(5));

  let periodic = periodic::run(db.clone(), storages);

  tokio::select! {
    result = monitor.run_with_signal(tokio::signal::ctrl_c()) => {
      result.map_err(|err| AppError::from(anyhow::Error::new(err)))?;
    }
    result = periodic => {
      result?;
    }
  }

  Ok(())
}
