use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use plexus_entities::{interaction, interaction_participant, message};
use plexus_shared::{APP_ENV, AppError};
use sea_orm::{
  ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
  TransactionTrait, prelude::Expr, sea_query::OnConflict,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entity::{IdentifierResolver, Resolution};
use crate::types::{
  ExtractionStatus, InteractionStatus, InteractionType, ParticipantRole, ResolutionStatus,
};

// ──────────────────────────────────────────────────
// Ingest envelope
// ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderIdentifier {
  #[serde(rename = "type")]
  pub identifier_type: String,
  pub value: String,
  pub display_name: Option<String>,
}

/// Normalized message envelope pushed by source adapters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEnvelope {
  pub source: String,
  pub chat_id: String,
  pub topic_id: Option<String>,
  pub chat_type: Option<String>,
  pub source_message_id: String,
  pub timestamp: DateTime<Utc>,
  pub sender_identifier: SenderIdentifier,
  pub recipient_identifier: Option<SenderIdentifier>,
  pub content: String,
  pub media_type: Option<String>,
  pub reply_to_source_message_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
  pub interaction_id: Uuid,
  pub message_id: Uuid,
  /// False when the envelope was an idempotent replay.
  pub message_created: bool,
  pub interaction_created: bool,
  /// The previously open interaction closed by gap cutover, if any.
  pub closed_interaction_id: Option<Uuid>,
  pub sender_resolution: ResolutionStatus,
}

// ──────────────────────────────────────────────────
// Placement decision (pure)
// ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
  /// Message continues the open session.
  AppendToOpen,
  /// Gap exceeded: close the open session and start a new one.
  Cutover,
  /// Message predates the open session; route to a covering interaction.
  OutOfOrder,
}

pub(crate) fn place_message(
  timestamp: DateTime<Utc>,
  open_started_at: DateTime<Utc>,
  open_last_message_at: DateTime<Utc>,
  gap: TimeDelta,
) -> Placement {
  if timestamp < open_started_at {
    return Placement::OutOfOrder;
  }
  if timestamp - open_last_message_at > gap {
    return Placement::Cutover;
  }
  Placement::AppendToOpen
}

fn interaction_type_for_source(source: &str) -> InteractionType {
  match source {
    "phone" => InteractionType::PhoneCall,
    "meet" | "zoom" | "video" => InteractionType::VideoMeeting,
    _ => InteractionType::TelegramSession,
  }
}

// ──────────────────────────────────────────────────
// Assembler
// ──────────────────────────────────────────────────

type SessionKey = (String, String, Option<String>);

/// Groups an unbounded stream of messages into gap-bounded interactions.
///
/// Writes per `(source, chat_id, topic_id)` key are serialized through a
/// keyed mutex; this is the only ordering guarantee. The lock map is
/// per-replica — the database row is the source of truth, so concurrent
/// replicas stay correct, just occasionally slower.
pub struct SessionAssembler {
  locks: Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl Default for SessionAssembler {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionAssembler {
  #[must_use]
  pub fn new() -> Self {
    Self { locks: Mutex::new(HashMap::new()) }
  }

  async fn key_lock(&self, key: &SessionKey) -> Arc<Mutex<()>> {
    let mut locks = self.locks.lock().await;
    locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
  }

  /// Ingest one envelope. Idempotent by `(interaction_id, source_message_id)`.
  pub async fn ingest(
    &self,
    envelope: IngestEnvelope,
    db: &DatabaseConnection,
  ) -> Result<IngestOutcome, AppError> {
    if envelope.content.is_empty() && envelope.media_type.is_none() {
      return Err(AppError::validation("message content cannot be empty"));
    }

    let key: SessionKey =
      (envelope.source.clone(), envelope.chat_id.clone(), envelope.topic_id.clone());
    let lock = self.key_lock(&key).await;
    let _guard = lock.lock().await;

    let gap = TimeDelta::hours(APP_ENV.session_gap_hours);
    let open = find_open_interaction(&key, db).await?;

    let mut interaction_created = false;
    let mut closed_interaction_id = None;

    let target = match &open {
      None => {
        interaction_created = true;
        create_interaction(&envelope, db).await?
      }
      Some(open_interaction) => {
        match place_message(
          envelope.timestamp,
          open_interaction.started_at.to_utc(),
          open_interaction.last_message_at.to_utc(),
          gap,
        ) {
          Placement::AppendToOpen => open_interaction.clone(),
          Placement::Cutover => {
            close_interaction(open_interaction, db).await?;
            closed_interaction_id = Some(open_interaction.id);
            interaction_created = true;
            create_interaction(&envelope, db).await?
          }
          Placement::OutOfOrder => {
            match find_covering_interaction(&key, envelope.timestamp, db).await? {
              Some(covering) => {
                // Late arrival inside (or after) a closed session: keep it
                // in the earlier interaction and flag for re-segmentation.
                if covering.status != InteractionStatus::Active.to_string() {
                  mark_needs_resegmentation(covering.id, db).await?;
                }
                covering
              }
              // Predates everything we know: the open session absorbs it and
              // its start moves back.
              None => open_interaction.clone(),
            }
          }
        }
      }
    };

    let (message_id, message_created) = insert_message(&envelope, target.id, db).await?;

    if !message_created {
      return Ok(IngestOutcome {
        interaction_id: target.id,
        message_id,
        message_created: false,
        interaction_created,
        closed_interaction_id,
        sender_resolution: ResolutionStatus::Pending,
      });
    }

    extend_interaction_bounds(&target, envelope.timestamp, db).await?;
    ensure_participant(&envelope, target.id, interaction_created, db).await?;

    // Resolve the sender once the message exists so the pending row can keep
    // it as a sample.
    let resolution = IdentifierResolver::resolve(
      &envelope.sender_identifier.identifier_type,
      &envelope.sender_identifier.value,
      envelope.sender_identifier.display_name.as_deref(),
      Some(message_id),
      db,
    )
    .await?;

    let sender_resolution = match resolution {
      Resolution::Resolved { entity_id } => {
        link_sender(message_id, target.id, &envelope, entity_id, db).await?;
        ResolutionStatus::Resolved
      }
      Resolution::Pending => ResolutionStatus::Pending,
    };

    tracing::debug!(
      interaction_id = %target.id,
      message_id = %message_id,
      interaction_created,
      ?sender_resolution,
      "Ingested message"
    );

    Ok(IngestOutcome {
      interaction_id: target.id,
      message_id,
      message_created: true,
      interaction_created,
      closed_interaction_id,
      sender_resolution,
    })
  }
}

// ──────────────────────────────────────────────────
// Persistence helpers
// ──────────────────────────────────────────────────

async fn find_open_interaction(
  key: &SessionKey,
  db: &DatabaseConnection,
) -> Result<Option<interaction::Model>, AppError> {
  let mut query = interaction::Entity::find()
    .filter(interaction::Column::Source.eq(key.0.clone()))
    .filter(interaction::Column::ChatId.eq(key.1.clone()))
    .filter(interaction::Column::Status.eq(InteractionStatus::Active.to_string()));

  query = match &key.2 {
    Some(topic) => query.filter(interaction::Column::TopicId.eq(topic.clone())),
    None => query.filter(interaction::Column::TopicId.is_null()),
  };

  Ok(query.one(db).await?)
}

/// Latest interaction for the key whose start does not postdate `timestamp`.
async fn find_covering_interaction(
  key: &SessionKey,
  timestamp: DateTime<Utc>,
  db: &DatabaseConnection,
) -> Result<Option<interaction::Model>, AppError> {
  let mut query = interaction::Entity::find()
    .filter(interaction::Column::Source.eq(key.0.clone()))
    .filter(interaction::Column::ChatId.eq(key.1.clone()))
    .filter(interaction::Column::StartedAt.lte(timestamp));

  query = match &key.2 {
    Some(topic) => query.filter(interaction::Column::TopicId.eq(topic.clone())),
    None => query.filter(interaction::Column::TopicId.is_null()),
  };

  Ok(query.order_by_desc(interaction::Column::StartedAt).one(db).await?)
}

async fn create_interaction(
  envelope: &IngestEnvelope,
  db: &DatabaseConnection,
) -> Result<interaction::Model, AppError> {
  let now = Utc::now();
  let model = interaction::ActiveModel {
    id: Set(Uuid::new_v4()),
    interaction_type: Set(interaction_type_for_source(&envelope.source).to_string()),
    source: Set(envelope.source.clone()),
    chat_id: Set(envelope.chat_id.clone()),
    topic_id: Set(envelope.topic_id.clone()),
    status: Set(InteractionStatus::Active.to_string()),
    started_at: Set(envelope.timestamp.into()),
    ended_at: Set(None),
    last_message_at: Set(envelope.timestamp.into()),
    source_metadata: Set(Some(serde_json::json!({
      "chat_type": envelope.chat_type,
    }))),
    needs_resegmentation: Set(false),
    segmented_at: Set(None),
    created_at: Set(now.into()),
    updated_at: Set(now.into()),
  };
  Ok(model.insert(db).await?)
}

/// Close a session at its last observed message.
async fn close_interaction(
  open: &interaction::Model,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  interaction::Entity::update_many()
    .col_expr(
      interaction::Column::Status,
      Expr::value(InteractionStatus::Completed.to_string()),
    )
    .col_expr(interaction::Column::EndedAt, Expr::value(Some(open.last_message_at)))
    .col_expr(interaction::Column::UpdatedAt, Expr::value(Utc::now()))
    .filter(interaction::Column::Id.eq(open.id))
    .filter(interaction::Column::Status.eq(InteractionStatus::Active.to_string()))
    .exec(db)
    .await?;

  tracing::info!(interaction_id = %open.id, "Closed interaction on gap cutover");
  Ok(())
}

async fn mark_needs_resegmentation(id: Uuid, db: &DatabaseConnection) -> Result<(), AppError> {
  interaction::Entity::update_many()
    .col_expr(interaction::Column::NeedsResegmentation, Expr::value(true))
    .col_expr(interaction::Column::UpdatedAt, Expr::value(Utc::now()))
    .filter(interaction::Column::Id.eq(id))
    .exec(db)
    .await?;
  Ok(())
}

/// Insert the message; returns `(id, created)`. A replayed source id is a
/// no-op resolved to the stored row.
async fn insert_message(
  envelope: &IngestEnvelope,
  interaction_id: Uuid,
  db: &DatabaseConnection,
) -> Result<(Uuid, bool), AppError> {
  let id = Uuid::new_v4();
  let model = message::ActiveModel {
    id: Set(id),
    interaction_id: Set(interaction_id),
    sender_entity_id: Set(None),
    recipient_entity_id: Set(None),
    sender_identifier_type: Set(envelope.sender_identifier.identifier_type.clone()),
    sender_identifier_value: Set(envelope.sender_identifier.value.clone()),
    content: Set(envelope.content.clone()),
    is_outgoing: Set(false),
    timestamp: Set(envelope.timestamp.into()),
    source_message_id: Set(Some(envelope.source_message_id.clone())),
    reply_to_message_id: Set(envelope.reply_to_source_message_id.clone()),
    media_type: Set(envelope.media_type.clone()),
    chat_type: Set(envelope.chat_type.clone()),
    topic_id: Set(envelope.topic_id.clone()),
    extraction_status: Set(ExtractionStatus::Unprocessed.to_string()),
    embedding: Set(None),
    created_at: Set(Utc::now().into()),
  };

  let inserted = message::Entity::insert(model)
    .on_conflict(
      OnConflict::columns([message::Column::InteractionId, message::Column::SourceMessageId])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

  if inserted > 0 {
    return Ok((id, true));
  }

  let existing = message::Entity::find()
    .filter(message::Column::InteractionId.eq(interaction_id))
    .filter(message::Column::SourceMessageId.eq(envelope.source_message_id.clone()))
    .one(db)
    .await?
    .ok_or_else(|| AppError::fatal("message vanished after idempotent insert"))?;

  Ok((existing.id, false))
}

/// Widen `[started_at, last_message_at]` to cover the new timestamp.
async fn extend_interaction_bounds(
  target: &interaction::Model,
  timestamp: DateTime<Utc>,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  let mut update = interaction::Entity::update_many()
    .col_expr(interaction::Column::UpdatedAt, Expr::value(Utc::now()))
    .filter(interaction::Column::Id.eq(target.id));

  if timestamp > target.last_message_at.to_utc() {
    update = update.col_expr(interaction::Column::LastMessageAt, Expr::value(timestamp));
  }
  if timestamp < target.started_at.to_utc() {
    update = update.col_expr(interaction::Column::StartedAt, Expr::value(timestamp));
  }

  update.exec(db).await?;
  Ok(())
}

async fn ensure_participant(
  envelope: &IngestEnvelope,
  interaction_id: Uuid,
  interaction_created: bool,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  let role = if interaction_created {
    ParticipantRole::Initiator
  } else {
    ParticipantRole::Participant
  };

  let sender = interaction_participant::ActiveModel {
    id: Set(Uuid::new_v4()),
    interaction_id: Set(interaction_id),
    entity_id: Set(None),
    role: Set(role.to_string()),
    identifier_type: Set(envelope.sender_identifier.identifier_type.clone()),
    identifier_value: Set(envelope.sender_identifier.value.clone()),
    display_name: Set(envelope.sender_identifier.display_name.clone()),
    created_at: Set(Utc::now().into()),
  };

  let conflict = OnConflict::columns([
    interaction_participant::Column::InteractionId,
    interaction_participant::Column::IdentifierType,
    interaction_participant::Column::IdentifierValue,
  ])
  .do_nothing()
  .to_owned();

  interaction_participant::Entity::insert(sender)
    .on_conflict(conflict.clone())
    .exec_without_returning(db)
    .await?;

  if let Some(recipient) = &envelope.recipient_identifier {
    let row = interaction_participant::ActiveModel {
      id: Set(Uuid::new_v4()),
      interaction_id: Set(interaction_id),
      entity_id: Set(None),
      role: Set(ParticipantRole::Recipient.to_string()),
      identifier_type: Set(recipient.identifier_type.clone()),
      identifier_value: Set(recipient.value.clone()),
      display_name: Set(recipient.display_name.clone()),
      created_at: Set(Utc::now().into()),
    };
    interaction_participant::Entity::insert(row)
      .on_conflict(conflict)
      .exec_without_returning(db)
      .await?;
  }

  Ok(())
}

/// Stamp resolved sender links onto the message and participant rows, and
/// flag outgoing messages authored by the owner.
async fn link_sender(
  message_id: Uuid,
  interaction_id: Uuid,
  envelope: &IngestEnvelope,
  entity_id: Uuid,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  let txn = db.begin().await?;

  let is_owner = plexus_entities::entity::Entity::find_by_id(entity_id)
    .one(&txn)
    .await?
    .is_some_and(|e| e.is_owner);

  message::Entity::update_many()
    .col_expr(message::Column::SenderEntityId, Expr::value(Some(entity_id)))
    .col_expr(message::Column::IsOutgoing, Expr::value(is_owner))
    .filter(message::Column::Id.eq(message_id))
    .exec(&txn)
    .await?;

  let mut update = interaction_participant::Entity::update_many()
    .col_expr(interaction_participant::Column::EntityId, Expr::value(Some(entity_id)))
    .filter(interaction_participant::Column::InteractionId.eq(interaction_id))
    .filter(
      interaction_participant::Column::IdentifierType
        .eq(envelope.sender_identifier.identifier_type.clone()),
    )
    .filter(
      interaction_participant::Column::IdentifierValue.eq(envelope.sender_identifier.value.clone()),
    );
  if is_owner {
    update =
      update.col_expr(interaction_participant::Column::Role, Expr::value(ParticipantRole::Slf.to_string()));
  }
  update.exec(&txn).await?;

  txn.commit().await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn ts(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, h, m, 0).unwrap()
  }

  #[test]
  fn message_within_gap_appends() {
    let placement = place_message(ts(12, 0), ts(10, 0), ts(11, 30), TimeDelta::hours(4));
    assert_eq!(placement, Placement::AppendToOpen);
  }

  #[test]
  fn gap_exceeded_cuts_over() {
    // 10:00 then 14:05 with a 4h gap: cutover.
    let placement = place_message(ts(14, 5), ts(10, 0), ts(10, 0), TimeDelta::hours(4));
    assert_eq!(placement, Placement::Cutover);
  }

  #[test]
  fn gap_boundary_is_exclusive() {
    let placement = place_message(ts(14, 0), ts(10, 0), ts(10, 0), TimeDelta::hours(4));
    assert_eq!(placement, Placement::AppendToOpen);
  }

  #[test]
  fn earlier_timestamp_is_out_of_order() {
    let placement = place_message(ts(9, 0), ts(10, 0), ts(11, 0), TimeDelta::hours(4));
    assert_eq!(placement, Placement::OutOfOrder);
  }

  #[test]
  fn source_maps_to_interaction_type() {
    assert_eq!(interaction_type_for_source("telegram"), InteractionType::TelegramSession);
    assert_eq!(interaction_type_for_source("phone"), InteractionType::PhoneCall);
    assert_eq!(interaction_type_for_source("zoom"), InteractionType::VideoMeeting);
  }
}
