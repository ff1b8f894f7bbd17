use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use plexus_core::{IdentifierResolver, types::EntityType};
use plexus_entities::pending_entity_resolution;
use plexus_shared::AppError;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::utils::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListResolutionsQuery {
  pub status: Option<String>,
  #[serde(default)]
  pub limit: u64,
  #[serde(default)]
  pub offset: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachRequest {
  pub entity_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityFromPendingRequest {
  pub name: String,
  #[serde(rename = "type")]
  pub entity_type: EntityType,
}

/// Unresolved identifiers awaiting operator action.
#[utoipa::path(
  get,
  path = "/pending-resolutions",
  params(ListResolutionsQuery),
  responses((status = 200, description = "Pending resolutions, oldest first"))
)]
#[axum::debug_handler]
pub async fn list_resolutions(
  State(state): State<AppState>,
  Query(query): Query<ListResolutionsQuery>,
) -> Result<Json<Vec<pending_entity_resolution::Model>>, AppError> {
  let mut find = pending_entity_resolution::Entity::find();
  if let Some(status) = query.status {
    find = find.filter(pending_entity_resolution::Column::Status.eq(status));
  }

  let limit = if query.limit == 0 { 50 } else { query.limit.min(200) };
  Ok(Json(
    find
      .order_by_asc(pending_entity_resolution::Column::FirstSeenAt)
      .limit(limit)
      .offset(query.offset)
      .all(&state.db)
      .await?,
  ))
}

/// Attach the pending identifier to an existing entity. Idempotent.
#[utoipa::path(
  post,
  path = "/pending-resolutions/{id}/attach",
  request_body = AttachRequest,
  responses(
    (status = 204, description = "Identifier attached"),
    (status = 404, description = "No such pending resolution or entity"),
    (status = 409, description = "Already resolved to another entity")
  )
)]
#[axum::debug_handler]
pub async fn attach(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Json(payload): Json<AttachRequest>,
) -> Result<StatusCode, AppError> {
  IdentifierResolver::attach(id, payload.entity_id, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Create a new entity for the pending identifier.
#[utoipa::path(
  post,
  path = "/pending-resolutions/{id}/create",
  request_body = CreateEntityFromPendingRequest,
  responses(
    (status = 201, description = "Entity created and attached"),
    (status = 409, description = "Not pending anymore")
  )
)]
#[axum::debug_handler]
pub async fn create_entity(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Json(payload): Json<CreateEntityFromPendingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
  let entity_id =
    IdentifierResolver::create_new(id, payload.name, payload.entity_type, &state.db).await?;
  Ok((StatusCode::CREATED, Json(serde_json::json!({ "entityId": entity_id }))))
}

/// Dismiss a pending identifier without attaching it.
#[utoipa::path(
  post,
  path = "/pending-resolutions/{id}/reject",
  responses(
    (status = 204, description = "Dismissed"),
    (status = 409, description = "Not pending anymore")
  )
)]
#[axum::debug_handler]
pub async fn reject(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
  IdentifierResolver::reject(id, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}
