use axum::{Json, extract::State};
use plexus_core::Auditor;
use plexus_core::audit::RemediationSummary;
use plexus_entities::data_quality_report;
use plexus_shared::AppError;

use crate::utils::AppState;

/// Run a detection-only audit and persist the report.
#[utoipa::path(
  post,
  path = "/data-quality/audit",
  responses((status = 200, description = "Audit report"))
)]
#[axum::debug_handler]
pub async fn audit(
  State(state): State<AppState>,
) -> Result<Json<data_quality_report::Model>, AppError> {
  Ok(Json(Auditor::run_audit(&state.db).await?))
}

/// Merge duplicate entity groups into their elected keepers.
#[utoipa::path(
  post,
  path = "/data-quality/auto-merge-duplicates",
  responses((status = 200, description = "Merge summary"))
)]
#[axum::debug_handler]
pub async fn auto_merge_duplicates(
  State(state): State<AppState>,
) -> Result<Json<RemediationSummary>, AppError> {
  Ok(Json(Auditor::auto_merge_duplicates(&state.db).await?))
}

/// Adopt orphaned tasks into the best-matching project.
#[utoipa::path(
  post,
  path = "/data-quality/auto-assign-orphans",
  responses((status = 200, description = "Adoption summary"))
)]
#[axum::debug_handler]
pub async fn auto_assign_orphans(
  State(state): State<AppState>,
) -> Result<Json<RemediationSummary>, AppError> {
  Ok(Json(Auditor::auto_assign_orphans(&state.db).await?))
}

/// Fill project clients from the extraction roster when unambiguous.
#[utoipa::path(
  post,
  path = "/data-quality/auto-resolve-clients",
  responses((status = 200, description = "Client assignment summary"))
)]
#[axum::debug_handler]
pub async fn auto_resolve_clients(
  State(state): State<AppState>,
) -> Result<Json<RemediationSummary>, AppError> {
  Ok(Json(Auditor::auto_resolve_clients(&state.db).await?))
}

/// Composite fix: merge, adopt, resolve, and persist one combined report.
#[utoipa::path(
  post,
  path = "/data-quality/auto-fix",
  responses((status = 200, description = "Combined remediation summary"))
)]
#[axum::debug_handler]
pub async fn auto_fix(
  State(state): State<AppState>,
) -> Result<Json<RemediationSummary>, AppError> {
  Ok(Json(Auditor::auto_fix(&state.db).await?))
}
