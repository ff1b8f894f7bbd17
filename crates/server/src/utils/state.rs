use std::sync::Arc;

use plexus_core::SessionAssembler;
use plexus_worker::JobStorages;
use sea_orm::DatabaseConnection;

#[derive(Clone)]
pub struct AppState {
  pub db: DatabaseConnection,
  pub storages: JobStorages,
  pub assembler: Arc<SessionAssembler>,
}

impl AppState {
  #[must_use]
  pub fn new(db: DatabaseConnection, storages: JobStorages) -> Self {
    Self {
      db,
      storages,
      assembler: Arc::new(SessionAssembler::new()),
    }
  }
}
