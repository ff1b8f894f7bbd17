use plexus_shared::{APP_ENV, AppError, normalize_name};
use sea_orm::{
  ConnectionTrait, DbBackend, FromQueryResult, Statement, prelude::PgVector,
};
use uuid::Uuid;

/// Similarity floor below which a candidate is considered genuinely new.
const REVIEW_FLOOR: f64 = 0.60;

/// Normalized-name Levenshtein ratio that counts as a strong match even when
/// embedding similarity is marginal.
const NAME_MATCH_RATIO: f64 = 0.90;

/// Nearest neighbors examined per candidate.
const NEIGHBOR_LIMIT: i64 = 5;

/// Decision for one extraction candidate against existing rows.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupeDecision {
  /// Duplicate of an existing row: merge into it instead of creating.
  Skip { existing_id: Uuid, similarity: f64 },
  /// Create, but flag for review with the suspected duplicate.
  CreateFlagged { existing_id: Uuid, similarity: f64 },
  /// Genuinely new.
  Create,
}

/// One existing row near the candidate in embedding space.
#[derive(Debug, Clone, FromQueryResult)]
pub struct Neighbor {
  pub id: Uuid,
  pub text: String,
  pub similarity: f64,
}

/// Two-tier classification of the nearest neighbor, with the normalized-name
/// edit-distance leg for name-like content.
pub(crate) fn classify(
  nearest: Option<&Neighbor>,
  candidate_text: &str,
  threshold: f64,
) -> DedupeDecision {
  let Some(neighbor) = nearest else { return DedupeDecision::Create };

  let name_ratio =
    strsim::normalized_levenshtein(&normalize_name(candidate_text), &normalize_name(&neighbor.text));

  let strong_name_match = name_ratio >= NAME_MATCH_RATIO && neighbor.similarity >= REVIEW_FLOOR;

  if neighbor.similarity >= threshold || strong_name_match {
    return DedupeDecision::Skip { existing_id: neighbor.id, similarity: neighbor.similarity };
  }
  if neighbor.similarity >= REVIEW_FLOOR {
    return DedupeDecision::CreateFlagged {
      existing_id: neighbor.id,
      similarity: neighbor.similarity,
    };
  }
  DedupeDecision::Create
}

pub struct Deduper;

impl Deduper {
  /// Decide what to do with a fact candidate for `entity_id`.
  pub async fn decide_fact<C: ConnectionTrait>(
    entity_id: Uuid,
    candidate_text: &str,
    embedding: &PgVector,
    db: &C,
  ) -> Result<DedupeDecision, AppError> {
    let sql = "SELECT id, COALESCE(value, fact_type) AS text, \
                      1 - (embedding <=> $1) AS similarity \
               FROM entity_fact \
               WHERE entity_id = $2 AND deleted_at IS NULL AND embedding IS NOT NULL \
               ORDER BY embedding <=> $1 \
               LIMIT $3";
    let neighbors = Self::neighbors(sql, [embedding.clone().into(), entity_id.into(), NEIGHBOR_LIMIT.into()], db).await?;
    Ok(classify(neighbors.first(), candidate_text, APP_ENV.semantic_similarity_threshold))
  }

  /// Decide what to do with an activity candidate owned by `owner_id`.
  pub async fn decide_activity<C: ConnectionTrait>(
    owner_id: Uuid,
    candidate_text: &str,
    embedding: &PgVector,
    db: &C,
  ) -> Result<DedupeDecision, AppError> {
    let sql = "SELECT id, name AS text, 1 - (embedding <=> $1) AS similarity \
               FROM activity \
               WHERE owner_entity_id = $2 AND deleted_at IS NULL AND embedding IS NOT NULL \
               ORDER BY embedding <=> $1 \
               LIMIT $3";
    let neighbors = Self::neighbors(sql, [embedding.clone().into(), owner_id.into(), NEIGHBOR_LIMIT.into()], db).await?;
    Ok(classify(neighbors.first(), candidate_text, APP_ENV.semantic_similarity_threshold))
  }

  /// Decide what to do with a commitment candidate.
  pub async fn decide_commitment<C: ConnectionTrait>(
    candidate_text: &str,
    embedding: &PgVector,
    db: &C,
  ) -> Result<DedupeDecision, AppError> {
    let sql = "SELECT id, title AS text, 1 - (embedding <=> $1) AS similarity \
               FROM commitment \
               WHERE deleted_at IS NULL AND embedding IS NOT NULL \
               ORDER BY embedding <=> $1 \
               LIMIT $2";
    let neighbors =
      Self::neighbors(sql, [embedding.clone().into(), NEIGHBOR_LIMIT.into()], db).await?;
    Ok(classify(neighbors.first(), candidate_text, APP_ENV.semantic_similarity_threshold))
  }

  async fn neighbors<C: ConnectionTrait, V: IntoIterator<Item = sea_orm::Value>>(
    sql: &str,
    values: V,
    db: &C,
  ) -> Result<Vec<Neighbor>, AppError> {
    Ok(
      Neighbor::find_by_statement(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
        .all(db)
        .await?,
    )
  }

  /// Absorb a duplicate: bump the confirmation count and attach provenance.
  pub async fn absorb_duplicate<C: ConnectionTrait>(
    table: &str,
    existing_id: Uuid,
    source_message_id: Option<Uuid>,
    db: &C,
  ) -> Result<(), AppError> {
    let sql = format!(
      "UPDATE {table} \
       SET confirmation_count = confirmation_count + 1, \
           metadata = jsonb_set(COALESCE(metadata, '{{}}'::jsonb), '{{confirmations}}', \
             COALESCE(metadata->'confirmations', '[]'::jsonb) || $2::jsonb) \
       WHERE id = $1"
    );
    let provenance = serde_json::json!([source_message_id]);
    db.execute_raw(Statement::from_sql_and_values(
      DbBackend::Postgres,
      &sql,
      [existing_id.into(), provenance.into()],
    ))
    .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn neighbor(similarity: f64, text: &str) -> Neighbor {
    Neighbor { id: Uuid::new_v4(), text: text.to_owned(), similarity }
  }

  #[test]
  fn high_similarity_skips() {
    let n = neighbor(0.91, "works at Acme");
    let decision = classify(Some(&n), "employed at Acme Corp", 0.85);
    assert!(matches!(decision, DedupeDecision::Skip { similarity, .. } if similarity == 0.91));
  }

  #[test]
  fn mid_similarity_creates_flagged() {
    let n = neighbor(0.70, "runs marathons");
    let decision = classify(Some(&n), "prefers trail running", 0.85);
    assert!(matches!(decision, DedupeDecision::CreateFlagged { .. }));
  }

  #[test]
  fn low_similarity_creates() {
    let n = neighbor(0.30, "lives in Lisbon");
    assert_eq!(classify(Some(&n), "has a dog", 0.85), DedupeDecision::Create);
  }

  #[test]
  fn no_neighbors_creates() {
    assert_eq!(classify(None, "anything", 0.85), DedupeDecision::Create);
  }

  #[test]
  fn strong_name_match_skips_despite_marginal_embedding() {
    let n = neighbor(0.65, "Acme Website Redesign");
    let decision = classify(Some(&n), "acme website redesign", 0.85);
    assert!(matches!(decision, DedupeDecision::Skip { .. }));
  }

  #[test]
  fn name_match_with_cost_annotation_stripped() {
    let n = neighbor(0.65, "Коктейль");
    let decision = classify(Some(&n), "Коктейль (424.39₽)", 0.85);
    assert!(matches!(decision, DedupeDecision::Skip { .. }));
  }
}
