use chrono::{DateTime, TimeDelta, Utc};
use plexus_entities::entity;
use plexus_shared::AppError;
use sea_orm::{
  ConnectionTrait, DbBackend, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect,
  Statement, prelude::Expr,
};
use serde::Serialize;
use uuid::Uuid;

/// Maximum candidates considered per query.
const CANDIDATE_LIMIT: u64 = 20;

/// Days of interaction history that count as "recent".
const RECENT_DAYS: i64 = 7;

pub struct Disambiguation;

/// Conversational context for scoring a name mention.
#[derive(Debug, Clone, Default)]
pub struct DisambiguationContext {
  pub chat_id: Option<String>,
  pub mentioned_with: Vec<String>,
  pub message_timestamp: Option<DateTime<Utc>>,
  pub recent_interaction_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
  pub entity: entity::Model,
  pub score: f64,
  pub reasons: Vec<String>,
}

/// Observed signals for one candidate; scoring over these is pure.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Signals {
  pub active: bool,
  pub recent_interaction: bool,
  pub in_chat: bool,
  pub linked_to_mentioned: bool,
}

pub(crate) fn score_signals(signals: Signals) -> (f64, Vec<String>) {
  let mut score = 0.0;
  let mut reasons = Vec::new();

  if signals.active {
    score += 0.1;
    reasons.push("active entity".to_owned());
  }
  if signals.recent_interaction {
    score += 0.3;
    reasons.push(format!("interacted within the last {RECENT_DAYS} days"));
  }
  if signals.in_chat {
    score += 0.2;
    reasons.push("participated in this chat".to_owned());
  }
  if signals.linked_to_mentioned {
    score += 0.4;
    reasons.push("linked to a co-mentioned entity".to_owned());
  }

  (score, reasons)
}

/// Ambiguity rule: the caller should confirm with the operator when the top
/// score is weak or the runner-up is close.
#[must_use]
pub fn is_ambiguous(top: f64, second: Option<f64>) -> bool {
  if top < 0.3 {
    return true;
  }
  second.is_some_and(|s| s >= 0.8 * top)
}

#[derive(Debug, FromQueryResult)]
struct ExistsRow {
  entity_id: Uuid,
}

impl Disambiguation {
  /// Rank candidate entities for a free-text name mention.
  pub async fn score<C: ConnectionTrait>(
    query: &str,
    context: &DisambiguationContext,
    db: &C,
  ) -> Result<Vec<ScoredCandidate>, AppError> {
    // Case-insensitive substring match over candidate names.
    let candidates = entity::Entity::find()
      .filter(Expr::cust_with_values("name ILIKE ?", [format!("%{query}%")]))
      .order_by_desc(entity::Column::UpdatedAt)
      .limit(CANDIDATE_LIMIT)
      .all(db)
      .await?;

    if candidates.is_empty() {
      return Ok(Vec::new());
    }

    let candidate_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
    let recent = recent_participants(&candidate_ids, db).await?;
    let in_chat = match &context.chat_id {
      Some(chat_id) => chat_participants(&candidate_ids, chat_id, db).await?,
      None => Vec::new(),
    };
    let linked = if context.mentioned_with.is_empty() {
      Vec::new()
    } else {
      linked_to_mentioned(&candidate_ids, &context.mentioned_with, db).await?
    };

    let mut scored: Vec<ScoredCandidate> = candidates
      .into_iter()
      .map(|candidate| {
        let signals = Signals {
          active: candidate.deleted_at.is_none(),
          recent_interaction: recent.contains(&candidate.id),
          in_chat: in_chat.contains(&candidate.id),
          linked_to_mentioned: linked.contains(&candidate.id),
        };
        let (score, reasons) = score_signals(signals);
        ScoredCandidate { entity: candidate, score, reasons }
      })
      .collect();

    // Tie-break on recency; candidates arrive sorted by updated_at already,
    // so a stable sort on score preserves it.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    Ok(scored)
  }
}

/// Candidates with any interaction in the last `RECENT_DAYS` days.
async fn recent_participants<C: ConnectionTrait>(
  candidate_ids: &[Uuid],
  db: &C,
) -> Result<Vec<Uuid>, AppError> {
  let cutoff = Utc::now() - TimeDelta::days(RECENT_DAYS);
  let sql = "SELECT DISTINCT p.entity_id \
             FROM interaction_participant p \
             JOIN interaction i ON i.id = p.interaction_id \
             WHERE p.entity_id = ANY($1) AND i.last_message_at > $2";

  let rows = ExistsRow::find_by_statement(Statement::from_sql_and_values(
    DbBackend::Postgres,
    sql,
    [candidate_ids.to_vec().into(), cutoff.into()],
  ))
  .all(db)
  .await?;

  Ok(rows.into_iter().map(|r| r.entity_id).collect())
}

/// Candidates that ever participated in `chat_id`.
async fn chat_participants<C: ConnectionTrait>(
  candidate_ids: &[Uuid],
  chat_id: &str,
  db: &C,
) -> Result<Vec<Uuid>, AppError> {
  let sql = "SELECT DISTINCT p.entity_id \
             FROM interaction_participant p \
             JOIN interaction i ON i.id = p.interaction_id \
             WHERE p.entity_id = ANY($1) AND i.chat_id = $2";

  let rows = ExistsRow::find_by_statement(Statement::from_sql_and_values(
    DbBackend::Postgres,
    sql,
    [candidate_ids.to_vec().into(), chat_id.into()],
  ))
  .all(db)
  .await?;

  Ok(rows.into_iter().map(|r| r.entity_id).collect())
}

/// Candidates linked (via organization_id or a current relation) to an entity
/// whose name contains any of the co-mentioned terms.
async fn linked_to_mentioned<C: ConnectionTrait>(
  candidate_ids: &[Uuid],
  mentioned_with: &[String],
  db: &C,
) -> Result<Vec<Uuid>, AppError> {
  let patterns: Vec<String> = mentioned_with.iter().map(|term| format!("%{term}%")).collect();

  let sql = "SELECT DISTINCT c.id AS entity_id \
             FROM entity c \
             JOIN entity other ON other.name ILIKE ANY($2) AND other.id <> c.id \
             LEFT JOIN entity_relation r \
               ON r.valid_until IS NULL \
              AND ((r.from_entity_id = c.id AND r.to_entity_id = other.id) \
                OR (r.to_entity_id = c.id AND r.from_entity_id = other.id)) \
             WHERE c.id = ANY($1) \
               AND (c.organization_id = other.id OR r.id IS NOT NULL)";

  let rows = ExistsRow::find_by_statement(Statement::from_sql_and_values(
    DbBackend::Postgres,
    sql,
    [candidate_ids.to_vec().into(), patterns.into()],
  ))
  .all(db)
  .await?;

  Ok(rows.into_iter().map(|r| r.entity_id).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn all_signals_sum_to_one() {
    let (score, reasons) = score_signals(Signals {
      active: true,
      recent_interaction: true,
      in_chat: true,
      linked_to_mentioned: true,
    });
    assert!((score - 1.0).abs() < 1e-9);
    assert_eq!(reasons.len(), 4);
  }

  #[test]
  fn inactive_unrelated_candidate_scores_zero() {
    let (score, reasons) = score_signals(Signals::default());
    assert_eq!(score, 0.0);
    assert!(reasons.is_empty());
  }

  #[test]
  fn active_only_scores_tenth() {
    let (score, _) = score_signals(Signals { active: true, ..Signals::default() });
    assert!((score - 0.1).abs() < 1e-9);
  }

  #[test]
  fn ambiguity_rule() {
    assert!(is_ambiguous(0.2, None));
    assert!(is_ambiguous(1.0, Some(0.9)));
    assert!(!is_ambiguous(1.0, Some(0.1)));
    assert!(!is_ambiguous(0.5, None));
  }
}
