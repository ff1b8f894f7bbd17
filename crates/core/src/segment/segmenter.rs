use chrono::Utc;
use plexus_ai::{
  ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
  ChatCompletionRequestUserMessage, cosine_similarity, embed, embed_many, generate_object,
};
use plexus_entities::{interaction, message, segment_message, topical_segment};
use plexus_shared::{APP_ENV, AppError};
use schemars::JsonSchema;
use sea_orm::{
  ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
  prelude::Expr,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::types::{ExtractionStatus, InteractionStatus, SegmentStatus};

use super::link_related_segments;

// ──────────────────────────────────────────────────
// Boundary detection constants
// ──────────────────────────────────────────────────

/// Rolling window size for the embedding-shift score.
const SHIFT_WINDOW: usize = 5;

/// Cosine distance between adjacent windows that counts as a topical shift.
const SHIFT_THRESHOLD: f32 = 0.35;

/// Embedding and LLM break suggestions are intersected with this slack.
const BREAK_TOLERANCE: usize = 1;

// ──────────────────────────────────────────────────
// LLM outputs
// ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
struct BreakSuggestions {
  /// Indexes of messages that START a new topic.
  breaks: Vec<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SegmentAnnotation {
  /// Short topic label for the segment.
  topic: String,
  /// 3 to 8 salient keywords.
  keywords: Vec<String>,
  /// Narrative summary useful for retrieval.
  summary: String,
  /// Model confidence in [0, 1].
  confidence: f64,
}

const BREAK_SYSTEM_PROMPT: &str = "\
You segment a conversation into topical units. Given numbered messages, \
return the indexes of messages that START a new topic. Index 0 is never a \
break. Prefer fewer, clearer boundaries over many small ones.";

const ANNOTATE_SYSTEM_PROMPT: &str = "\
You annotate one topical conversation segment. Produce a short topic label, \
3-8 salient keywords, and a third-person summary that preserves names, \
decisions, and commitments for later retrieval. Report your confidence in \
[0, 1].";

// ──────────────────────────────────────────────────
// Pure boundary math
// ──────────────────────────────────────────────────

fn mean_vector(vectors: &[Vec<f32>]) -> Vec<f32> {
  let Some(first) = vectors.first() else { return Vec::new() };
  let mut mean = vec![0.0_f32; first.len()];
  for v in vectors {
    for (m, x) in mean.iter_mut().zip(v.iter()) {
      *m += x;
    }
  }
  let n = vectors.len() as f32;
  for m in &mut mean {
    *m /= n;
  }
  mean
}

/// Candidate break indexes from the embedding channel: positions where the
/// rolling windows before and after drift apart.
pub(crate) fn embedding_breaks(embeddings: &[Vec<f32>], window: usize) -> Vec<usize> {
  let mut breaks = Vec::new();
  if embeddings.len() < window * 2 {
    return breaks;
  }

  for i in window..=(embeddings.len() - window) {
    let before = mean_vector(&embeddings[i - window..i]);
    let after = mean_vector(&embeddings[i..i + window]);
    let distance = 1.0 - cosine_similarity(&before, &after);
    if distance > SHIFT_THRESHOLD {
      breaks.push(i);
    }
  }
  breaks
}

/// Intersect the two channels: a break survives only if both agree within
/// `tolerance` positions.
pub(crate) fn intersect_breaks(
  embedding: &[usize],
  llm: &[usize],
  tolerance: usize,
) -> Vec<usize> {
  let mut out: Vec<usize> = embedding
    .iter()
    .copied()
    .filter(|e| llm.iter().any(|l| e.abs_diff(*l) <= tolerance))
    .collect();
  out.dedup();
  out
}

/// Drop breaks that would create segments below `min`; force extra breaks so
/// no segment exceeds `max`.
pub(crate) fn enforce_bounds(breaks: &[usize], len: usize, min: usize, max: usize) -> Vec<usize> {
  let mut kept = Vec::new();
  let mut last = 0usize;
  for &b in breaks {
    if b <= last || b >= len {
      continue;
    }
    if b - last >= min && len - b >= min {
      kept.push(b);
      last = b;
    }
  }

  // Split oversized stretches.
  let mut bounded = Vec::new();
  let mut start = 0usize;
  for &b in kept.iter().chain(std::iter::once(&len)) {
    let mut cursor = start;
    while b - cursor > max {
      cursor += max;
      bounded.push(cursor);
    }
    if b < len {
      bounded.push(b);
    }
    start = b;
  }
  bounded
}

/// Fraction of keywords that literally appear in the segment text.
pub(crate) fn keyword_coverage(keywords: &[String], text: &str) -> f64 {
  if keywords.is_empty() {
    return 0.0;
  }
  let haystack = text.to_lowercase();
  let hits = keywords.iter().filter(|k| haystack.contains(&k.to_lowercase())).count();
  hits as f64 / keywords.len() as f64
}

// ──────────────────────────────────────────────────
// Segmenter
// ──────────────────────────────────────────────────

pub struct Segmenter;

impl Segmenter {
  /// Partition a closed (or re-flagged) interaction into topical segments.
  /// Returns the created segment ids.
  pub async fn segment_interaction(
    interaction_id: Uuid,
    db: &DatabaseConnection,
  ) -> Result<Vec<Uuid>, AppError> {
    let interaction = interaction::Entity::find_by_id(interaction_id)
      .one(db)
      .await?
      .ok_or_else(|| AppError::not_found(format!("interaction {interaction_id} not found")))?;

    let messages = message::Entity::find()
      .filter(message::Column::InteractionId.eq(interaction_id))
      .order_by_asc(message::Column::Timestamp)
      .all(db)
      .await?;

    if messages.is_empty() {
      return Ok(Vec::new());
    }

    // Re-segmentation supersedes the previous pass.
    if interaction.needs_resegmentation {
      topical_segment::Entity::update_many()
        .col_expr(
          topical_segment::Column::Status,
          Expr::value(SegmentStatus::Superseded.to_string()),
        )
        .filter(topical_segment::Column::InteractionId.eq(interaction_id))
        .exec(db)
        .await?;
    }

    let break_points = if messages.len() < APP_ENV.min_segment_messages * 2 {
      Vec::new()
    } else {
      detect_breaks(&messages).await?
    };

    let mut segment_ids = Vec::new();
    let mut start = 0usize;
    for &end in break_points.iter().chain(std::iter::once(&messages.len())) {
      let slice = &messages[start..end];
      if slice.is_empty() {
        continue;
      }
      let id = persist_segment(&interaction, slice, db).await?;
      segment_ids.push(id);
      start = end;
    }

    interaction::Entity::update_many()
      .col_expr(interaction::Column::SegmentedAt, Expr::value(Some(Utc::now())))
      .col_expr(interaction::Column::NeedsResegmentation, Expr::value(false))
      .col_expr(interaction::Column::UpdatedAt, Expr::value(Utc::now()))
      .filter(interaction::Column::Id.eq(interaction_id))
      .exec(db)
      .await?;

    for &segment_id in &segment_ids {
      link_related_segments(segment_id, db).await?;
    }

    tracing::info!(
      interaction_id = %interaction_id,
      segments = segment_ids.len(),
      messages = messages.len(),
      "Segmented interaction"
    );

    Ok(segment_ids)
  }

  /// Interactions ready for segmentation: completed + settled, not yet
  /// segmented, or explicitly re-flagged.
  pub async fn pending_interactions(
    db: &DatabaseConnection,
  ) -> Result<Vec<Uuid>, AppError> {
    let settle_cutoff = Utc::now() - chrono::TimeDelta::minutes(APP_ENV.settle_delay_minutes);

    let rows = interaction::Entity::find()
      .filter(
        sea_orm::Condition::any()
          .add(
            sea_orm::Condition::all()
              .add(interaction::Column::Status.eq(InteractionStatus::Completed.to_string()))
              .add(interaction::Column::SegmentedAt.is_null())
              .add(interaction::Column::EndedAt.lte(settle_cutoff)),
          )
          .add(interaction::Column::NeedsResegmentation.eq(true)),
      )
      .order_by_asc(interaction::Column::EndedAt)
      .all(db)
      .await?;

    Ok(rows.into_iter().map(|r| r.id).collect())
  }
}

/// Dual-channel boundary detection: embedding drift intersected with LLM
/// break suggestions, then bounded by segment size limits.
async fn detect_breaks(messages: &[message::Model]) -> Result<Vec<usize>, AppError> {
  let embeddings = message_embeddings(messages).await?;
  let from_embeddings = embedding_breaks(&embeddings, SHIFT_WINDOW);

  let numbered = messages
    .iter()
    .enumerate()
    .map(|(i, m)| format!("[{i}] {}", m.content))
    .collect::<Vec<_>>()
    .join("\n");

  let suggestions = generate_object::<BreakSuggestions>(
    vec![
      ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(
        BREAK_SYSTEM_PROMPT,
      )),
      ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(numbered)),
    ],
    "break_suggestions".to_owned(),
    Some("Indexes of messages starting a new topic".to_owned()),
  )
  .await?;

  let from_llm: Vec<usize> = suggestions.breaks.iter().map(|b| *b as usize).collect();
  let intersected = intersect_breaks(&from_embeddings, &from_llm, BREAK_TOLERANCE);

  Ok(enforce_bounds(
    &intersected,
    messages.len(),
    APP_ENV.min_segment_messages,
    APP_ENV.max_segment_messages,
  ))
}

/// Stored message embeddings, computing any that the embedding worker has
/// not filled yet.
async fn message_embeddings(messages: &[message::Model]) -> Result<Vec<Vec<f32>>, AppError> {
  let mut result: Vec<Option<Vec<f32>>> =
    messages.iter().map(|m| m.embedding.clone().map(|e| e.to_vec())).collect();

  let missing: Vec<usize> =
    result.iter().enumerate().filter(|(_, e)| e.is_none()).map(|(i, _)| i).collect();

  if !missing.is_empty() {
    let inputs: Vec<String> = missing.iter().map(|&i| messages[i].content.clone()).collect();
    let computed = embed_many(&inputs).await?;
    for (&i, vector) in missing.iter().zip(computed) {
      result[i] = Some(vector.to_vec());
    }
  }

  Ok(result.into_iter().map(|e| e.expect("all embeddings filled")).collect())
}

async fn persist_segment(
  interaction: &interaction::Model,
  messages: &[message::Model],
  db: &DatabaseConnection,
) -> Result<Uuid, AppError> {
  let text = messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");

  let annotation = generate_object::<SegmentAnnotation>(
    vec![
      ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(
        ANNOTATE_SYSTEM_PROMPT,
      )),
      ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(text.clone())),
    ],
    "segment_annotation".to_owned(),
    Some("Topic, keywords, summary and confidence for one segment".to_owned()),
  )
  .await?;

  let mut keywords = annotation.keywords;
  keywords.truncate(8);

  let coverage = keyword_coverage(&keywords, &text);
  let confidence = annotation.confidence.clamp(0.0, 1.0).min(coverage);

  let mut participant_counts: std::collections::HashMap<Uuid, usize> =
    std::collections::HashMap::new();
  for m in messages {
    if let Some(sender) = m.sender_entity_id {
      *participant_counts.entry(sender).or_default() += 1;
    }
  }
  let primary = participant_counts.iter().max_by_key(|(_, n)| **n).map(|(id, _)| *id);
  let participant_ids: Vec<Uuid> = participant_counts.keys().copied().collect();

  let embedding = embed(&annotation.summary).await?;

  let id = Uuid::new_v4();
  let txn = db.begin().await?;

  let started_at = messages.first().expect("segment is non-empty").timestamp;
  let ended_at = messages.last().expect("segment is non-empty").timestamp;

  let model = topical_segment::ActiveModel {
    id: Set(id),
    chat_id: Set(interaction.chat_id.clone()),
    interaction_id: Set(Some(interaction.id)),
    topic: Set(annotation.topic),
    keywords: Set(keywords),
    summary: Set(annotation.summary),
    participant_ids: Set(participant_ids),
    primary_participant_id: Set(primary),
    message_count: Set(messages.len() as i32),
    started_at: Set(started_at),
    ended_at: Set(ended_at),
    extracted_items: Set(None),
    status: Set(SegmentStatus::Active.to_string()),
    confidence: Set(confidence),
    related_segment_ids: Set(Vec::new()),
    extraction_status: Set(ExtractionStatus::Unprocessed.to_string()),
    extraction_attempts: Set(0),
    extraction_error: Set(None),
    batch_id: Set(None),
    embedding: Set(Some(embedding)),
    created_at: Set(Utc::now().into()),
  };
  topical_segment::Entity::insert(model).exec_without_returning(&txn).await?;

  for (position, m) in messages.iter().enumerate() {
    let join = segment_message::ActiveModel {
      segment_id: Set(id),
      message_id: Set(m.id),
      position: Set(position as i32),
    };
    segment_message::Entity::insert(join).exec_without_returning(&txn).await?;
  }

  txn.commit().await?;
  Ok(id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn intersect_requires_both_channels() {
    assert_eq!(intersect_breaks(&[5, 10, 20], &[10, 30], 0), vec![10]);
    assert_eq!(intersect_breaks(&[5, 10], &[], 0), Vec::<usize>::new());
  }

  #[test]
  fn intersect_tolerates_off_by_one() {
    assert_eq!(intersect_breaks(&[9], &[10], 1), vec![9]);
    assert_eq!(intersect_breaks(&[8], &[10], 1), Vec::<usize>::new());
  }

  #[test]
  fn bounds_drop_tiny_segments() {
    // A break at 1 would create a 1-message head segment.
    assert_eq!(enforce_bounds(&[1], 10, 3, 80), Vec::<usize>::new());
    assert_eq!(enforce_bounds(&[5], 10, 3, 80), vec![5]);
  }

  #[test]
  fn bounds_split_oversized_segments() {
    let breaks = enforce_bounds(&[], 200, 3, 80);
    assert_eq!(breaks, vec![80, 160]);
  }

  #[test]
  fn coverage_counts_literal_hits() {
    let keywords = vec!["rust".to_owned(), "tokio".to_owned(), "missing".to_owned()];
    let coverage = keyword_coverage(&keywords, "We moved the Rust service to Tokio.");
    assert!((coverage - 2.0 / 3.0).abs() < 1e-9);
  }

  #[test]
  fn embedding_breaks_detect_drift() {
    // Ten aligned vectors, then ten orthogonal ones: one clear boundary region.
    let mut vectors = vec![vec![1.0, 0.0]; 10];
    vectors.extend(vec![vec![0.0, 1.0]; 10]);
    let breaks = embedding_breaks(&vectors, 5);
    assert!(breaks.contains(&10));
  }

  #[test]
  fn embedding_breaks_empty_for_short_input() {
    let vectors = vec![vec![1.0, 0.0]; 4];
    assert!(embedding_breaks(&vectors, 5).is_empty());
  }
}
