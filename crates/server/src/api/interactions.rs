use axum::{
  Json,
  extract::{Path, Query, State},
};
use plexus_entities::{interaction, interaction_participant, message};
use plexus_shared::AppError;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::utils::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListInteractionsQuery {
  pub chat_id: Option<String>,
  pub status: Option<String>,
  #[serde(default)]
  pub limit: u64,
  #[serde(default)]
  pub offset: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDetail {
  #[serde(flatten)]
  pub interaction: interaction::Model,
  pub participants: Vec<interaction_participant::Model>,
  pub messages: Vec<message::Model>,
}

/// Recent interactions, newest first.
#[utoipa::path(
  get,
  path = "/interactions",
  params(ListInteractionsQuery),
  responses((status = 200, description = "Interactions, newest first"))
)]
#[axum::debug_handler]
pub async fn list_interactions(
  State(state): State<AppState>,
  Query(query): Query<ListInteractionsQuery>,
) -> Result<Json<Vec<interaction::Model>>, AppError> {
  let mut find = interaction::Entity::find();
  if let Some(chat_id) = query.chat_id {
    find = find.filter(interaction::Column::ChatId.eq(chat_id));
  }
  if let Some(status) = query.status {
    find = find.filter(interaction::Column::Status.eq(status));
  }

  let limit = if query.limit == 0 { 50 } else { query.limit.min(200) };
  Ok(Json(
    find
      .order_by_desc(interaction::Column::StartedAt)
      .limit(limit)
      .offset(query.offset)
      .all(&state.db)
      .await?,
  ))
}

/// One interaction with its participants and messages.
#[utoipa::path(
  get,
  path = "/interactions/{id}",
  responses(
    (status = 200, description = "Interaction with messages"),
    (status = 404, description = "No such interaction")
  )
)]
#[axum::debug_handler]
pub async fn get_interaction(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> Result<Json<InteractionDetail>, AppError> {
  let interaction = interaction::Entity::find_by_id(id)
    .one(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found(format!("interaction {id} not found")))?;

  let participants = interaction_participant::Entity::find()
    .filter(interaction_participant::Column::InteractionId.eq(id))
    .all(&state.db)
    .await?;

  let messages = message::Entity::find()
    .filter(message::Column::InteractionId.eq(id))
    .order_by_asc(message::Column::Timestamp)
    .all(&state.db)
    .await?;

  Ok(Json(InteractionDetail { interaction, participants, messages }))
}
