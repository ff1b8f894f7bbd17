use chrono::{DateTime, Utc};
use plexus_ai::{
  ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
  ChatCompletionRequestUserMessage, embed, generate_object,
};
use plexus_entities::{
  activity, commitment, entity, entity_fact, interaction_participant, message, pending_approval,
  segment_message, topical_segment,
};
use plexus_shared::{AppError, ErrorKind};
use schemars::JsonSchema;
use sea_orm::{
  ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, ExprTrait, QueryFilter,
  QueryOrder, QuerySelect, Set, TransactionTrait, prelude::Expr,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::activity::ActivityTree;
use crate::entity::{Disambiguation, DisambiguationContext, disambiguation};
use crate::extraction::{DedupeDecision, Deduper};
use crate::types::{
  ActivityStatus, ActivityType, ApprovalStatus, CommitmentStatus, CommitmentType,
  ExtractionStatus, FactRank, FactSource, FactStatus, ItemType, SegmentStatus,
};

/// Attempts after which a failed segment stops being retried.
pub const MAX_EXTRACTION_ATTEMPTS: i32 = 3;

// ──────────────────────────────────────────────────
// LLM extraction schema
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractionOutput {
  facts: Vec<FactCandidate>,
  activities: Vec<ActivityCandidate>,
  commitments: Vec<CommitmentCandidate>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FactCandidate {
  /// Name of the person or organization the fact is about.
  entity_name: String,
  /// Machine-friendly fact type, e.g. "employer", "birthday", "city".
  fact_type: String,
  category: Option<String>,
  value: String,
  /// ISO date when the fact is date-valued.
  value_date: Option<String>,
  confidence: f64,
  /// Verbatim quote supporting the fact.
  quote: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ActivityCandidate {
  name: String,
  /// "project" or "task".
  kind: String,
  parent_name: Option<String>,
  client_name: Option<String>,
  due_date: Option<String>,
  confidence: f64,
  quote: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CommitmentCandidate {
  title: String,
  /// "promise", "request", "agreement", "deadline", "reminder" or "recurring".
  kind: String,
  from_name: Option<String>,
  to_name: Option<String>,
  /// RFC3339 due timestamp if one was stated.
  due_date: Option<String>,
  /// Cron expression for recurring commitments.
  recurrence_rule: Option<String>,
  confidence: f64,
  quote: String,
}

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract structured knowledge from one topical conversation segment.

Extract three kinds of items:
1. facts: atomic, lasting claims about people or organizations (employer, \
   city, birthday, preferences). Ignore transient states.
2. activities: projects and tasks being worked on or agreed upon.
3. commitments: promises or requests between people, with due dates when \
   stated.

Rules:
- Use names exactly as they appear in the participant directory when possible.
- Every item carries a confidence in [0, 1] and a short verbatim quote.
- Return empty arrays when nothing qualifies.";

// ──────────────────────────────────────────────────
// Orchestrator
// ──────────────────────────────────────────────────

pub struct Orchestrator;

struct SegmentContext {
  segment: topical_segment::Model,
  transcript: String,
  owner_id: Option<Uuid>,
  chat_id: String,
  source_interaction_id: Option<Uuid>,
  /// A message id from the segment used as provenance for skips.
  sample_message_id: Option<Uuid>,
}

impl Orchestrator {
  /// Run extraction for one segment. Refuses already-processed segments and
  /// segments with a live draft batch unless `force` is set.
  pub async fn process_segment(
    segment_id: Uuid,
    force: bool,
    db: &DatabaseConnection,
  ) -> Result<(), AppError> {
    let segment = topical_segment::Entity::find_by_id(segment_id)
      .one(db)
      .await?
      .ok_or_else(|| AppError::not_found(format!("segment {segment_id} not found")))?;

    if segment.status != SegmentStatus::Active.to_string() {
      return Err(AppError::conflict("segment is not active"));
    }

    if !force {
      if segment.extraction_status == ExtractionStatus::Processed.to_string() {
        return Err(AppError::conflict("segment already processed"));
      }
      if let Some(batch_id) = segment.batch_id {
        let live = pending_approval::Entity::find()
          .filter(pending_approval::Column::BatchId.eq(batch_id))
          .filter(pending_approval::Column::Status.eq(ApprovalStatus::Pending.to_string()))
          .limit(1)
          .all(db)
          .await?;
        if !live.is_empty() {
          return Err(AppError::conflict("segment has a pending draft batch"));
        }
      }
    }

    mark_status(segment_id, ExtractionStatus::Pending, None, db).await?;

    let context = load_context(segment, db).await?;
    let output = match run_llm(&context).await {
      Ok(output) => output,
      Err(err) => {
        record_failure(segment_id, &err, db).await?;
        return Err(err);
      }
    };

    let batch_id = Uuid::new_v4();
    let txn = db.begin().await?;
    let mut created = ExtractedIds::default();

    for fact in &output.facts {
      if let Err(err) = create_fact_draft(fact, &context, batch_id, &mut created, &txn).await {
        tracing::warn!(segment_id = %segment_id, error = %err, "Skipping fact candidate");
      }
    }
    for activity_candidate in &output.activities {
      if let Err(err) =
        create_activity_draft(activity_candidate, &context, batch_id, &mut created, &txn).await
      {
        tracing::warn!(segment_id = %segment_id, error = %err, "Skipping activity candidate");
      }
    }
    for commitment_candidate in &output.commitments {
      if let Err(err) =
        create_commitment_draft(commitment_candidate, &context, batch_id, &mut created, &txn).await
      {
        tracing::warn!(segment_id = %segment_id, error = %err, "Skipping commitment candidate");
      }
    }

    topical_segment::Entity::update_many()
      .col_expr(
        topical_segment::Column::ExtractionStatus,
        Expr::value(ExtractionStatus::Processed.to_string()),
      )
      .col_expr(topical_segment::Column::BatchId, Expr::value(Some(batch_id)))
      .col_expr(topical_segment::Column::ExtractionError, Expr::value(Option::<String>::None))
      .col_expr(
        topical_segment::Column::ExtractedItems,
        Expr::value(Some(serde_json::to_value(&created)?)),
      )
      .filter(topical_segment::Column::Id.eq(segment_id))
      .exec(&txn)
      .await?;

    txn.commit().await?;

    tracing::info!(
      segment_id = %segment_id,
      batch_id = %batch_id,
      facts = created.facts.len(),
      activities = created.activities.len(),
      commitments = created.commitments.len(),
      "Extraction completed"
    );

    Ok(())
  }

  /// Segments eligible for extraction: active, unprocessed or failed below
  /// the retry cap.
  pub async fn pending_segments(db: &DatabaseConnection) -> Result<Vec<Uuid>, AppError> {
    let rows = topical_segment::Entity::find()
      .filter(topical_segment::Column::Status.eq(SegmentStatus::Active.to_string()))
      .filter(
        sea_orm::Condition::any()
          .add(
            topical_segment::Column::ExtractionStatus
              .eq(ExtractionStatus::Unprocessed.to_string()),
          )
          .add(
            sea_orm::Condition::all()
              .add(topical_segment::Column::ExtractionStatus.eq(ExtractionStatus::Failed.to_string()))
              .add(topical_segment::Column::ExtractionAttempts.lt(MAX_EXTRACTION_ATTEMPTS)),
          ),
      )
      .order_by_asc(topical_segment::Column::CreatedAt)
      .all(db)
      .await?;
    Ok(rows.into_iter().map(|r| r.id).collect())
  }
}

#[derive(Debug, Default, serde::Serialize)]
struct ExtractedIds {
  facts: Vec<Uuid>,
  activities: Vec<Uuid>,
  commitments: Vec<Uuid>,
}

async fn mark_status(
  segment_id: Uuid,
  status: ExtractionStatus,
  error: Option<String>,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  topical_segment::Entity::update_many()
    .col_expr(topical_segment::Column::ExtractionStatus, Expr::value(status.to_string()))
    .col_expr(topical_segment::Column::ExtractionError, Expr::value(error))
    .filter(topical_segment::Column::Id.eq(segment_id))
    .exec(db)
    .await?;
  Ok(())
}

async fn record_failure(
  segment_id: Uuid,
  err: &AppError,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  topical_segment::Entity::update_many()
    .col_expr(
      topical_segment::Column::ExtractionStatus,
      Expr::value(ExtractionStatus::Failed.to_string()),
    )
    .col_expr(topical_segment::Column::ExtractionError, Expr::value(Some(err.to_string())))
    .col_expr(
      topical_segment::Column::ExtractionAttempts,
      Expr::col(topical_segment::Column::ExtractionAttempts).add(1),
    )
    .filter(topical_segment::Column::Id.eq(segment_id))
    .exec(db)
    .await?;
  Ok(())
}

/// Load everything the prompt needs: transcript, participant directory,
/// owner and their activity names.
async fn load_context(
  segment: topical_segment::Model,
  db: &DatabaseConnection,
) -> Result<SegmentContext, AppError> {
  let joins = segment_message::Entity::find()
    .filter(segment_message::Column::SegmentId.eq(segment.id))
    .order_by_asc(segment_message::Column::Position)
    .all(db)
    .await?;
  let message_ids: Vec<Uuid> = joins.iter().map(|j| j.message_id).collect();

  let mut messages = message::Entity::find()
    .filter(message::Column::Id.is_in(message_ids.clone()))
    .all(db)
    .await?;
  messages.sort_by_key(|m| m.timestamp);

  let participants = match segment.interaction_id {
    Some(interaction_id) => {
      interaction_participant::Entity::find()
        .filter(interaction_participant::Column::InteractionId.eq(interaction_id))
        .all(db)
        .await?
    }
    None => Vec::new(),
  };

  let directory = participants
    .iter()
    .map(|p| {
      let name = p.display_name.clone().unwrap_or_else(|| p.identifier_value.clone());
      format!("- {name} ({}:{})", p.identifier_type, p.identifier_value)
    })
    .collect::<Vec<_>>()
    .join("\n");

  let owner = entity::Entity::find()
    .filter(entity::Column::IsOwner.eq(true))
    .filter(entity::Column::DeletedAt.is_null())
    .one(db)
    .await?;
  let owner_id = owner.as_ref().map(|o| o.id);

  let owner_activities = match owner_id {
    Some(owner_id) => {
      activity::Entity::find()
        .filter(activity::Column::OwnerEntityId.eq(owner_id))
        .filter(activity::Column::DeletedAt.is_null())
        .filter(activity::Column::Status.eq(ActivityStatus::Active.to_string()))
        .limit(100)
        .all(db)
        .await?
        .into_iter()
        .map(|a| a.name)
        .collect::<Vec<_>>()
    }
    None => Vec::new(),
  };

  let transcript_lines: Vec<String> = messages
    .iter()
    .map(|m| {
      let sender = participants
        .iter()
        .find(|p| {
          p.identifier_type == m.sender_identifier_type
            && p.identifier_value == m.sender_identifier_value
        })
        .and_then(|p| p.display_name.clone())
        .unwrap_or_else(|| m.sender_identifier_value.clone());
      format!("{sender}: {}", m.content)
    })
    .collect();

  let transcript = format!(
    "Participants:\n{directory}\n\nKnown activities:\n{}\n\nConversation:\n{}",
    owner_activities.join(", "),
    transcript_lines.join("\n"),
  );

  let sample_message_id = messages.first().map(|m| m.id);

  Ok(SegmentContext {
    chat_id: segment.chat_id.clone(),
    source_interaction_id: segment.interaction_id,
    segment,
    transcript,
    owner_id,
    sample_message_id,
  })
}

async fn run_llm(context: &SegmentContext) -> Result<ExtractionOutput, AppError> {
  generate_object::<ExtractionOutput>(
    vec![
      ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(
        EXTRACTION_SYSTEM_PROMPT,
      )),
      ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(
        context.transcript.clone(),
      )),
    ],
    "knowledge_extraction".to_owned(),
    Some("Facts, activities and commitments from one segment".to_owned()),
  )
  .await
}

/// Resolve a mentioned name to an entity, or `None` when ambiguous.
async fn resolve_name(
  name: &str,
  context: &SegmentContext,
  db: &DatabaseTransaction,
) -> Result<Option<Uuid>, AppError> {
  let scored = Disambiguation::score(
    name,
    &DisambiguationContext {
      chat_id: Some(context.chat_id.clone()),
      mentioned_with: Vec::new(),
      message_timestamp: None,
      recent_interaction_ids: Vec::new(),
    },
    db,
  )
  .await?;

  let top = scored.first();
  let second_score = scored.get(1).map(|c| c.score);

  match top {
    Some(candidate)
      if !disambiguation::is_ambiguous(candidate.score, second_score)
        && candidate.score >= 0.3 =>
    {
      Ok(Some(candidate.entity.id))
    }
    _ => {
      tracing::warn!(name, "Unresolved mention kept as display name");
      Ok(None)
    }
  }
}

fn parse_date(value: Option<&String>) -> Option<DateTime<Utc>> {
  value.and_then(|v| {
    DateTime::parse_from_rfc3339(v)
      .map(|dt| dt.to_utc())
      .ok()
      .or_else(|| {
        chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d")
          .ok()
          .and_then(|d| d.and_hms_opt(0, 0, 0))
          .map(|dt| dt.and_utc())
      })
  })
}

async fn create_approval(
  item_type: ItemType,
  target_id: Uuid,
  batch_id: Uuid,
  confidence: f64,
  quote: &str,
  context: &SegmentContext,
  entity_id: Option<Uuid>,
  txn: &DatabaseTransaction,
) -> Result<(), AppError> {
  let approval = pending_approval::ActiveModel {
    id: Set(Uuid::new_v4()),
    item_type: Set(item_type.to_string()),
    target_id: Set(target_id),
    batch_id: Set(batch_id),
    status: Set(ApprovalStatus::Pending.to_string()),
    confidence: Set(confidence),
    source_quote: Set(Some(quote.to_owned())),
    source_interaction_id: Set(context.source_interaction_id),
    source_entity_id: Set(entity_id),
    context: Set(Some(context.segment.topic.clone())),
    created_at: Set(Utc::now().into()),
    reviewed_at: Set(None),
  };
  pending_approval::Entity::insert(approval).exec_without_returning(txn).await?;
  Ok(())
}

async fn create_fact_draft(
  candidate: &FactCandidate,
  context: &SegmentContext,
  batch_id: Uuid,
  created: &mut ExtractedIds,
  txn: &DatabaseTransaction,
) -> Result<(), AppError> {
  // Facts require a resolved subject.
  let Some(entity_id) = resolve_name(&candidate.entity_name, context, txn).await? else {
    return Ok(());
  };

  let embedding = embed(&candidate.value).await?;
  let decision = Deduper::decide_fact(entity_id, &candidate.value, &embedding, txn).await?;

  // Savepoint so one bad candidate cannot poison the batch.
  let savepoint = txn.begin().await?;

  match decision {
    DedupeDecision::Skip { existing_id, similarity } => {
      tracing::debug!(%existing_id, similarity, "Fact absorbed by existing row");
      Deduper::absorb_duplicate("entity_fact", existing_id, context.sample_message_id, &savepoint)
        .await?;
    }
    decision => {
      let needs_review = matches!(decision, DedupeDecision::CreateFlagged { .. });
      let metadata_review = match &decision {
        DedupeDecision::CreateFlagged { existing_id, similarity } => {
          Some(format!("possible duplicate of {existing_id} (similarity {similarity:.2})"))
        }
        _ => None,
      };

      let id = Uuid::new_v4();
      let now = Utc::now();
      let fact = entity_fact::ActiveModel {
        id: Set(id),
        entity_id: Set(entity_id),
        fact_type: Set(candidate.fact_type.clone()),
        category: Set(candidate.category.clone()),
        value: Set(Some(candidate.value.clone())),
        value_date: Set(
          candidate
            .value_date
            .as_ref()
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        ),
        value_json: Set(None),
        source: Set(FactSource::Extracted.to_string()),
        confidence: Set(candidate.confidence.clamp(0.0, 1.0)),
        source_interaction_id: Set(context.source_interaction_id),
        valid_from: Set(Some(now.into())),
        valid_until: Set(None),
        status: Set(FactStatus::Draft.to_string()),
        rank: Set(FactRank::Normal.to_string()),
        superseded_by: Set(None),
        needs_review: Set(needs_review),
        review_reason: Set(metadata_review),
        confirmation_count: Set(0),
        metadata: Set(Some(serde_json::json!({ "draft_batch_id": batch_id }))),
        embedding: Set(Some(embedding)),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        deleted_at: Set(None),
      };
      entity_fact::Entity::insert(fact).exec_without_returning(&savepoint).await?;
      create_approval(
        ItemType::Fact,
        id,
        batch_id,
        candidate.confidence,
        &candidate.quote,
        context,
        Some(entity_id),
        &savepoint,
      )
      .await?;
      created.facts.push(id);
    }
  }

  savepoint.commit().await?;
  Ok(())
}

async fn create_activity_draft(
  candidate: &ActivityCandidate,
  context: &SegmentContext,
  batch_id: Uuid,
  created: &mut ExtractedIds,
  txn: &DatabaseTransaction,
) -> Result<(), AppError> {
  let Some(owner_id) = context.owner_id else {
    return Err(AppError::new(ErrorKind::Validation, anyhow::anyhow!("no owner entity configured")));
  };

  let activity_type = match candidate.kind.as_str() {
    "project" => ActivityType::Project,
    _ => ActivityType::Task,
  };

  let embedding = embed(&candidate.name).await?;
  let decision = Deduper::decide_activity(owner_id, &candidate.name, &embedding, txn).await?;

  let savepoint = txn.begin().await?;

  match decision {
    DedupeDecision::Skip { existing_id, similarity } => {
      tracing::debug!(%existing_id, similarity, "Activity absorbed by existing row");
      Deduper::absorb_duplicate("activity", existing_id, context.sample_message_id, &savepoint)
        .await?;
    }
    decision => {
      let client_id = match &candidate.client_name {
        Some(name) => resolve_name(name, context, &savepoint).await?,
        None => None,
      };
      let parent_id = match &candidate.parent_name {
        Some(name) => ActivityTree::find_by_name(name, &savepoint).await?,
        None => None,
      };

      let needs_review = matches!(decision, DedupeDecision::CreateFlagged { .. });
      let review_reason = match &decision {
        DedupeDecision::CreateFlagged { existing_id, similarity } => {
          Some(format!("possible duplicate of {existing_id} (similarity {similarity:.2})"))
        }
        _ => None,
      };

      let id = ActivityTree::create_draft(
        &candidate.name,
        activity_type,
        parent_id,
        owner_id,
        client_id,
        parse_date(candidate.due_date.as_ref()),
        needs_review,
        review_reason,
        Some(serde_json::json!({ "draft_batch_id": batch_id })),
        Some(embedding),
        &savepoint,
      )
      .await?;

      let item_type = match activity_type {
        ActivityType::Project => ItemType::Project,
        _ => ItemType::Task,
      };
      create_approval(
        item_type,
        id,
        batch_id,
        candidate.confidence,
        &candidate.quote,
        context,
        client_id,
        &savepoint,
      )
      .await?;
      created.activities.push(id);
    }
  }

  savepoint.commit().await?;
  Ok(())
}

async fn create_commitment_draft(
  candidate: &CommitmentCandidate,
  context: &SegmentContext,
  batch_id: Uuid,
  created: &mut ExtractedIds,
  txn: &DatabaseTransaction,
) -> Result<(), AppError> {
  let embedding = embed(&candidate.title).await?;
  let decision = Deduper::decide_commitment(&candidate.title, &embedding, txn).await?;

  let savepoint = txn.begin().await?;

  match decision {
    DedupeDecision::Skip { existing_id, similarity } => {
      tracing::debug!(%existing_id, similarity, "Commitment absorbed by existing row");
      Deduper::absorb_duplicate("commitment", existing_id, context.sample_message_id, &savepoint)
        .await?;
    }
    decision => {
      let from_entity_id = match &candidate.from_name {
        Some(name) => resolve_name(name, context, &savepoint).await?,
        None => None,
      };
      let to_entity_id = match &candidate.to_name {
        Some(name) => resolve_name(name, context, &savepoint).await?,
        None => None,
      };
      // Unresolved counterparty stays as display text.
      let to_display_name = match (to_entity_id, &candidate.to_name) {
        (None, Some(name)) => Some(name.clone()),
        _ => None,
      };

      let commitment_type: CommitmentType =
        candidate.kind.parse().unwrap_or(CommitmentType::Promise);

      let needs_review = matches!(decision, DedupeDecision::CreateFlagged { .. });
      let review_reason = match &decision {
        DedupeDecision::CreateFlagged { existing_id, similarity } => {
          Some(format!("possible duplicate of {existing_id} (similarity {similarity:.2})"))
        }
        _ => None,
      };

      let id = Uuid::new_v4();
      let now = Utc::now();
      let model = commitment::ActiveModel {
        id: Set(id),
        commitment_type: Set(commitment_type.to_string()),
        title: Set(candidate.title.clone()),
        description: Set(None),
        status: Set(CommitmentStatus::Draft.to_string()),
        from_entity_id: Set(from_entity_id),
        to_entity_id: Set(to_entity_id),
        to_display_name: Set(to_display_name),
        activity_id: Set(None),
        source_message_id: Set(context.sample_message_id),
        source_interaction_id: Set(context.source_interaction_id),
        due_date: Set(parse_date(candidate.due_date.as_ref()).map(Into::into)),
        recurrence_rule: Set(candidate.recurrence_rule.clone()),
        next_reminder_at: Set(None),
        reminder_count: Set(0),
        confidence: Set(candidate.confidence.clamp(0.0, 1.0)),
        needs_review: Set(needs_review),
        review_reason: Set(review_reason),
        confirmation_count: Set(0),
        metadata: Set(Some(serde_json::json!({ "draft_batch_id": batch_id }))),
        embedding: Set(Some(embedding)),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        deleted_at: Set(None),
      };
      commitment::Entity::insert(model).exec_without_returning(&savepoint).await?;
      create_approval(
        ItemType::Commitment,
        id,
        batch_id,
        candidate.confidence,
        &candidate.quote,
        context,
        from_entity_id,
        &savepoint,
      )
      .await?;
      created.commitments.push(id);
    }
  }

  savepoint.commit().await?;
  Ok(())
}
