use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use plexus_core::{ApprovalWorkflow, BatchOutcome, BatchStats, UpdateDraft, types::ApprovalStatus};
use plexus_entities::pending_approval;
use plexus_shared::AppError;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::utils::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListApprovalsQuery {
  pub batch_id: Option<Uuid>,
  pub status: Option<ApprovalStatus>,
  #[serde(default)]
  pub limit: u64,
  #[serde(default)]
  pub offset: u64,
}

/// The operator review queue.
#[utoipa::path(
  get,
  path = "/pending-approvals",
  params(ListApprovalsQuery),
  responses((status = 200, description = "Approvals, newest first"))
)]
#[axum::debug_handler]
pub async fn list_approvals(
  State(state): State<AppState>,
  Query(query): Query<ListApprovalsQuery>,
) -> Result<Json<Vec<pending_approval::Model>>, AppError> {
  Ok(Json(
    ApprovalWorkflow::list(query.batch_id, query.status, query.limit, query.offset, &state.db)
      .await?,
  ))
}

/// Approve one draft. Approving twice returns 409.
#[utoipa::path(
  post,
  path = "/pending-approvals/{id}/approve",
  responses(
    (status = 204, description = "Draft activated"),
    (status = 404, description = "No such approval"),
    (status = 409, description = "Already reviewed")
  )
)]
#[axum::debug_handler]
pub async fn approve(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
  ApprovalWorkflow::approve(id, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Reject one draft (soft delete under the retention window).
#[utoipa::path(
  post,
  path = "/pending-approvals/{id}/reject",
  responses(
    (status = 204, description = "Draft rejected"),
    (status = 404, description = "No such approval"),
    (status = 409, description = "Already reviewed")
  )
)]
#[axum::debug_handler]
pub async fn reject(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
  ApprovalWorkflow::reject(id, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Edit a draft's fields before the decision. Reparenting is not allowed
/// here.
#[utoipa::path(
  patch,
  path = "/pending-approvals/{id}/target",
  responses(
    (status = 204, description = "Draft updated"),
    (status = 404, description = "No such approval or draft"),
    (status = 409, description = "Already reviewed")
  )
)]
#[axum::debug_handler]
pub async fn update_target(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Json(payload): Json<UpdateDraft>,
) -> Result<StatusCode, AppError> {
  ApprovalWorkflow::update_target(id, payload, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Approve every pending draft in a batch; failures are per-item.
#[utoipa::path(
  post,
  path = "/pending-approvals/batch/{batchId}/approve",
  responses((status = 200, description = "Per-item outcomes"))
)]
#[axum::debug_handler]
pub async fn batch_approve(
  State(state): State<AppState>,
  Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchOutcome>, AppError> {
  Ok(Json(ApprovalWorkflow::batch_approve(batch_id, &state.db).await?))
}

/// Reject every pending draft in a batch; failures are per-item.
#[utoipa::path(
  post,
  path = "/pending-approvals/batch/{batchId}/reject",
  responses((status = 200, description = "Per-item outcomes"))
)]
#[axum::debug_handler]
pub async fn batch_reject(
  State(state): State<AppState>,
  Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchOutcome>, AppError> {
  Ok(Json(ApprovalWorkflow::batch_reject(batch_id, &state.db).await?))
}

/// Pending/approved/rejected counts for one batch.
#[utoipa::path(
  get,
  path = "/pending-approvals/batch/{batchId}/stats",
  responses((status = 200, description = "Batch counters"))
)]
#[axum::debug_handler]
pub async fn batch_stats(
  State(state): State<AppState>,
  Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchStats>, AppError> {
  Ok(Json(ApprovalWorkflow::batch_stats(batch_id, &state.db).await?))
}
