use std::collections::HashSet;

use chrono::{TimeDelta, Utc};
use plexus_entities::topical_segment;
use plexus_shared::AppError;
use sea_orm::{
  ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
  QueryOrder, QuerySelect, Statement,
};
use uuid::Uuid;

use crate::types::SegmentStatus;

/// Lookback window for relating segments across chats.
const LINK_WINDOW_DAYS: i64 = 30;

/// Keyword overlap that counts as the same topic.
const KEYWORD_JACCARD_MIN: f64 = 0.5;

/// Participant overlap only links segments this close in time.
const PROXIMITY_HOURS: i64 = 24;

/// Candidates examined per linking pass.
const CANDIDATE_LIMIT: u64 = 200;

pub(crate) fn jaccard(a: &[String], b: &[String]) -> f64 {
  if a.is_empty() && b.is_empty() {
    return 0.0;
  }
  let left: HashSet<String> = a.iter().map(|s| s.to_lowercase()).collect();
  let right: HashSet<String> = b.iter().map(|s| s.to_lowercase()).collect();
  let intersection = left.intersection(&right).count();
  let union = left.union(&right).count();
  intersection as f64 / union as f64
}

fn activity_ids(extracted_items: Option<&serde_json::Value>) -> HashSet<Uuid> {
  extracted_items
    .and_then(|items| items.get("activities"))
    .and_then(|a| a.as_array())
    .map(|ids| ids.iter().filter_map(|v| v.as_str()?.parse().ok()).collect())
    .unwrap_or_default()
}

pub(crate) fn segments_related(
  a: &topical_segment::Model,
  b: &topical_segment::Model,
) -> bool {
  // Shared activity link.
  let a_activities = activity_ids(a.extracted_items.as_ref());
  if !a_activities.is_empty() && !a_activities.is_disjoint(&activity_ids(b.extracted_items.as_ref()))
  {
    return true;
  }

  if jaccard(&a.keywords, &b.keywords) >= KEYWORD_JACCARD_MIN {
    return true;
  }

  let a_participants: HashSet<Uuid> = a.participant_ids.iter().copied().collect();
  let shares_participant = b.participant_ids.iter().any(|p| a_participants.contains(p));
  if shares_participant {
    let delta = (a.started_at.to_utc() - b.started_at.to_utc()).abs();
    return delta < TimeDelta::hours(PROXIMITY_HOURS);
  }

  false
}

/// Populate `related_segment_ids` symmetrically between `segment_id` and any
/// related segment from other chats in the last `LINK_WINDOW_DAYS`.
pub(crate) async fn link_related_segments(
  segment_id: Uuid,
  db: &DatabaseConnection,
) -> Result<(), AppError> {
  let Some(segment) = topical_segment::Entity::find_by_id(segment_id).one(db).await? else {
    return Ok(());
  };

  let cutoff = Utc::now() - TimeDelta::days(LINK_WINDOW_DAYS);
  let candidates = topical_segment::Entity::find()
    .filter(topical_segment::Column::Id.ne(segment_id))
    .filter(topical_segment::Column::ChatId.ne(segment.chat_id.clone()))
    .filter(topical_segment::Column::Status.eq(SegmentStatus::Active.to_string()))
    .filter(topical_segment::Column::StartedAt.gte(cutoff))
    .order_by_desc(topical_segment::Column::StartedAt)
    .limit(CANDIDATE_LIMIT)
    .all(db)
    .await?;

  let related: Vec<Uuid> =
    candidates.iter().filter(|c| segments_related(&segment, c)).map(|c| c.id).collect();

  for other_id in related {
    append_related(segment_id, other_id, db).await?;
    append_related(other_id, segment_id, db).await?;
  }

  Ok(())
}

async fn append_related<C: ConnectionTrait>(
  segment_id: Uuid,
  related_id: Uuid,
  db: &C,
) -> Result<(), AppError> {
  db.execute_raw(Statement::from_sql_and_values(
    DbBackend::Postgres,
    "UPDATE topical_segment \
     SET related_segment_ids = related_segment_ids || $2 \
     WHERE id = $1 AND NOT related_segment_ids @> ARRAY[$2]",
    [segment_id.into(), related_id.into()],
  ))
  .await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use sea_orm::prelude::DateTimeWithTimeZone;

  fn segment(
    chat: &str,
    keywords: &[&str],
    participants: &[Uuid],
    hour: u32,
  ) -> topical_segment::Model {
    let at: DateTimeWithTimeZone =
      Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap().into();
    topical_segment::Model {
      id: Uuid::new_v4(),
      chat_id: chat.to_owned(),
      interaction_id: None,
      topic: "t".to_owned(),
      keywords: keywords.iter().map(|s| (*s).to_owned()).collect(),
      summary: String::new(),
      participant_ids: participants.to_vec(),
      primary_participant_id: None,
      message_count: 5,
      started_at: at,
      ended_at: at,
      extracted_items: None,
      status: "active".to_owned(),
      confidence: 0.9,
      related_segment_ids: Vec::new(),
      extraction_status: "unprocessed".to_owned(),
      extraction_attempts: 0,
      extraction_error: None,
      batch_id: None,
      embedding: None,
      created_at: at,
    }
  }

  #[test]
  fn jaccard_half_overlap() {
    let a = vec!["budget".to_owned(), "deadline".to_owned()];
    let b = vec!["budget".to_owned(), "deadline".to_owned(), "acme".to_owned(), "q3".to_owned()];
    assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
  }

  #[test]
  fn keyword_overlap_links() {
    let a = segment("chat_a", &["budget", "acme"], &[], 10);
    let b = segment("chat_b", &["budget", "acme"], &[], 20);
    assert!(segments_related(&a, &b));
  }

  #[test]
  fn weak_keywords_do_not_link() {
    let a = segment("chat_a", &["budget", "acme", "q3", "travel"], &[], 10);
    let b = segment("chat_b", &["budget", "office", "party", "photos"], &[], 11);
    assert!(!segments_related(&a, &b));
  }

  #[test]
  fn shared_participant_links_only_nearby_in_time() {
    let p = Uuid::new_v4();
    let a = segment("chat_a", &["x"], &[p], 10);
    let near = segment("chat_b", &["y"], &[p], 20);
    assert!(segments_related(&a, &near));

    let mut far = segment("chat_b", &["y"], &[p], 10);
    far.started_at = Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap().into();
    assert!(!segments_related(&a, &far));
  }
}
