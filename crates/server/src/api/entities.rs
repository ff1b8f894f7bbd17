use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use plexus_core::{
  EntityFilter, EntityStore, MergeOutcome, NewEntity, NewFact, UpdateEntity,
  types::{CreationSource, EntityType, FactSource},
};
use plexus_entities::{entity, entity_fact};
use plexus_shared::AppError;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::utils::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEntitiesQuery {
  #[serde(rename = "type")]
  pub entity_type: Option<EntityType>,
  pub search: Option<String>,
  #[serde(default)]
  pub limit: u64,
  #[serde(default)]
  pub offset: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityRequest {
  #[serde(rename = "type")]
  pub entity_type: EntityType,
  pub name: String,
  pub organization_id: Option<Uuid>,
  pub notes: Option<String>,
  #[serde(default)]
  pub is_bot: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchEntityRequest {
  pub name: Option<String>,
  pub organization_id: Option<Uuid>,
  pub notes: Option<String>,
  pub is_bot: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFactRequest {
  pub fact_type: String,
  pub category: Option<String>,
  pub value: Option<String>,
  pub value_date: Option<chrono::NaiveDate>,
  pub value_json: Option<serde_json::Value>,
  #[serde(default = "default_confidence")]
  pub confidence: f64,
}

fn default_confidence() -> f64 {
  1.0
}

/// List entities with optional type and name filters.
#[utoipa::path(
  get,
  path = "/entities",
  params(ListEntitiesQuery),
  responses((status = 200, description = "Matching entities"))
)]
#[axum::debug_handler]
pub async fn list_entities(
  State(state): State<AppState>,
  Query(query): Query<ListEntitiesQuery>,
) -> Result<Json<Vec<entity::Model>>, AppError> {
  let filter = EntityFilter {
    entity_type: query.entity_type,
    search: query.search,
    include_deleted: false,
    limit: query.limit,
    offset: query.offset,
  };
  Ok(Json(EntityStore::list(filter, &state.db).await?))
}

/// Create an entity manually.
#[utoipa::path(
  post,
  path = "/entities",
  request_body = CreateEntityRequest,
  responses(
    (status = 201, description = "Entity created"),
    (status = 400, description = "Invalid organization reference")
  )
)]
#[axum::debug_handler]
pub async fn create_entity(
  State(state): State<AppState>,
  Json(payload): Json<CreateEntityRequest>,
) -> Result<(StatusCode, Json<entity::Model>), AppError> {
  let created = EntityStore::create(
    NewEntity {
      entity_type: payload.entity_type,
      name: payload.name,
      organization_id: payload.organization_id,
      notes: payload.notes,
      is_owner: false,
      is_bot: payload.is_bot,
      creation_source: CreationSource::Manual,
    },
    &state.db,
  )
  .await?;
  Ok((StatusCode::CREATED, Json(created)))
}

/// Patch an entity's editable fields.
#[utoipa::path(
  patch,
  path = "/entities/{id}",
  request_body = PatchEntityRequest,
  responses(
    (status = 200, description = "Entity updated"),
    (status = 404, description = "No such entity")
  )
)]
#[axum::debug_handler]
pub async fn patch_entity(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Json(payload): Json<PatchEntityRequest>,
) -> Result<Json<entity::Model>, AppError> {
  let updated = EntityStore::update(
    id,
    UpdateEntity {
      name: payload.name,
      organization_id: payload.organization_id.map(Some),
      notes: payload.notes.map(Some),
      is_bot: payload.is_bot,
    },
    &state.db,
  )
  .await?;
  Ok(Json(updated))
}

/// Soft-delete an entity.
#[utoipa::path(
  delete,
  path = "/entities/{id}",
  responses(
    (status = 204, description = "Entity soft-deleted"),
    (status = 404, description = "No such entity")
  )
)]
#[axum::debug_handler]
pub async fn delete_entity(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
  EntityStore::soft_delete(id, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Merge one entity into another, reassigning identifiers, facts, and
/// interaction links.
#[utoipa::path(
  post,
  path = "/entities/{from}/merge/{to}",
  responses(
    (status = 200, description = "Merge counts"),
    (status = 404, description = "Either entity missing")
  )
)]
#[axum::debug_handler]
pub async fn merge_entities(
  State(state): State<AppState>,
  Path((from, to)): Path<(Uuid, Uuid)>,
) -> Result<Json<MergeOutcome>, AppError> {
  Ok(Json(EntityStore::merge(from, to, &state.db).await?))
}

/// Active facts for an entity.
#[utoipa::path(
  get,
  path = "/entities/{id}/facts",
  responses((status = 200, description = "Active facts, preferred first"))
)]
#[axum::debug_handler]
pub async fn list_facts(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<entity_fact::Model>>, AppError> {
  Ok(Json(EntityStore::list_facts(id, &state.db).await?))
}

/// Record a fact; the previous active fact of the same type is superseded.
#[utoipa::path(
  post,
  path = "/entities/{id}/facts",
  request_body = CreateFactRequest,
  responses(
    (status = 201, description = "Fact recorded"),
    (status = 400, description = "Confidence outside [0, 1]")
  )
)]
#[axum::debug_handler]
pub async fn create_fact(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Json(payload): Json<CreateFactRequest>,
) -> Result<(StatusCode, Json<entity_fact::Model>), AppError> {
  let created = EntityStore::create_fact(
    id,
    NewFact {
      fact_type: payload.fact_type,
      category: payload.category,
      value: payload.value,
      value_date: payload.value_date,
      value_json: payload.value_json,
      source: FactSource::Manual,
      confidence: payload.confidence,
      source_interaction_id: None,
    },
    &state.db,
  )
  .await?;
  Ok((StatusCode::CREATED, Json(created)))
}

/// Soft-delete a fact.
#[utoipa::path(
  delete,
  path = "/facts/{id}",
  responses(
    (status = 204, description = "Fact soft-deleted"),
    (status = 404, description = "No such fact")
  )
)]
#[axum::debug_handler]
pub async fn delete_fact(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
  EntityStore::soft_delete_fact(id, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}
