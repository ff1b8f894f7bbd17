use plexus_shared::{APP_ENV, AppError};
use plexus_worker::JobStorages;
use sea_orm::DatabaseConnection;

use crate::api;
use crate::auth::AuthService;
use crate::utils::{AppState, shutdown_signal};

/// Serve the HTTP surface until shutdown.
pub async fn server(db: DatabaseConnection, storages: JobStorages) -> Result<(), AppError> {
  // Bootstrap operator, if configured.
  if let (Some(username), Some(password)) =
    (&APP_ENV.operator_username, &APP_ENV.operator_password)
  {
    AuthService::ensure_operator(username, password, &db).await?;
  }

  let state = AppState::new(db, storages);
  let router = api::app(state);

  let addr = format!("0.0.0.0:{}", APP_ENV.port);
  let listener = tokio::net::TcpListener::bind(&addr).await?;
  tracing::info!(%addr, "HTTP server listening");

  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}
