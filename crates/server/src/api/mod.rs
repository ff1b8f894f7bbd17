use axum::{
  Json, Router, middleware,
  routing::{delete, get, patch, post},
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::auth::require_auth;
use crate::utils::AppState;

mod approvals;
mod auth_routes;
mod data_quality;
mod entities;
mod ingest;
mod interactions;
mod resolutions;

pub use ingest::IngestResponse;

#[derive(OpenApi)]
#[openapi(
  info(
    title = "Plexus API",
    version = "0.1.0",
    description = "Personal knowledge-graph extraction and curation backend"
  ),
  paths(
    ingest::ingest,
    auth_routes::login,
    auth_routes::refresh,
    auth_routes::logout,
    auth_routes::logout_all,
    entities::list_entities,
    entities::create_entity,
    entities::patch_entity,
    entities::delete_entity,
    entities::merge_entities,
    entities::list_facts,
    entities::create_fact,
    entities::delete_fact,
    interactions::list_interactions,
    interactions::get_interaction,
    approvals::list_approvals,
    approvals::approve,
    approvals::reject,
    approvals::update_target,
    approvals::batch_approve,
    approvals::batch_reject,
    approvals::batch_stats,
    resolutions::list_resolutions,
    resolutions::attach,
    resolutions::create_entity,
    resolutions::reject,
    data_quality::audit,
    data_quality::auto_merge_duplicates,
    data_quality::auto_assign_orphans,
    data_quality::auto_resolve_clients,
    data_quality::auto_fix,
  ),
  components(schemas(
    ingest::IngestResponse,
    auth_routes::LoginRequest,
    auth_routes::RefreshRequest,
    auth_routes::TokenResponse,
    entities::CreateEntityRequest,
    entities::PatchEntityRequest,
    entities::CreateFactRequest,
    resolutions::AttachRequest,
    resolutions::CreateEntityFromPendingRequest,
  ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
  Json(ApiDoc::openapi())
}

/// Assemble the full router. Public routes (auth, OpenAPI) opt out of the
/// guard; everything else goes through JWT/API-key auth.
pub fn app(state: AppState) -> Router {
  let public = Router::new()
    .route("/auth/login", post(auth_routes::login))
    .route("/auth/refresh", post(auth_routes::refresh))
    .route("/auth/logout", post(auth_routes::logout))
    .route("/auth/logout-all", post(auth_routes::logout_all))
    .route("/openapi.json", get(openapi_json))
    .merge(Scalar::with_url("/openapi/", ApiDoc::openapi()));

  let protected = Router::new()
    .route("/api/v1/ingest", post(ingest::ingest))
    .route("/entities", get(entities::list_entities).post(entities::create_entity))
    .route(
      "/entities/{id}",
      patch(entities::patch_entity).delete(entities::delete_entity),
    )
    .route("/entities/{from}/merge/{to}", post(entities::merge_entities))
    .route(
      "/entities/{id}/facts",
      get(entities::list_facts).post(entities::create_fact),
    )
    .route("/facts/{id}", delete(entities::delete_fact))
    .route("/interactions", get(interactions::list_interactions))
    .route("/interactions/{id}", get(interactions::get_interaction))
    .route("/pending-approvals", get(approvals::list_approvals))
    .route("/pending-approvals/{id}/approve", post(approvals::approve))
    .route("/pending-approvals/{id}/reject", post(approvals::reject))
    .route("/pending-approvals/{id}/target", patch(approvals::update_target))
    .route("/pending-approvals/batch/{batchId}/approve", post(approvals::batch_approve))
    .route("/pending-approvals/batch/{batchId}/reject", post(approvals::batch_reject))
    .route("/pending-approvals/batch/{batchId}/stats", get(approvals::batch_stats))
    .route("/pending-resolutions", get(resolutions::list_resolutions))
    .route("/pending-resolutions/{id}/attach", post(resolutions::attach))
    .route("/pending-resolutions/{id}/create", post(resolutions::create_entity))
    .route("/pending-resolutions/{id}/reject", post(resolutions::reject))
    .route("/data-quality/audit", post(data_quality::audit))
    .route("/data-quality/auto-merge-duplicates", post(data_quality::auto_merge_duplicates))
    .route("/data-quality/auto-assign-orphans", post(data_quality::auto_assign_orphans))
    .route("/data-quality/auto-resolve-clients", post(data_quality::auto_resolve_clients))
    .route("/data-quality/auto-fix", post(data_quality::auto_fix))
    .layer(middleware::from_fn_with_state(state.clone(), require_auth));

  public.merge(protected).with_state(state)
}
