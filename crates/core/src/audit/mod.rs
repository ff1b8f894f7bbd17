use std::collections::HashMap;

use chrono::{DateTime, Utc};
use plexus_entities::{
  activity, commitment, data_quality_report, entity, entity_fact, entity_identifier,
  interaction_participant, topical_segment,
};
use plexus_shared::{AppError, normalize_name};
use sea_orm::{
  ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
  TransactionTrait, prelude::Expr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::activity::ActivityTree;
use crate::entity::EntityStore;
use crate::types::{ActivityStatus, ActivityType, EntityType};

/// Page size for streaming table scans.
const SCAN_PAGE_SIZE: u64 = 500;

pub struct Auditor;

// ──────────────────────────────────────────────────
// Report shapes
// ──────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
pub struct AuditMetrics {
  pub entities_scanned: u64,
  pub duplicate_groups: usize,
  pub orphaned_tasks: usize,
  pub projects_missing_client: usize,
  pub field_fill_rates: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateGroup {
  pub normalized_name: String,
  pub entity_type: String,
  pub entity_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Serialize)]
pub struct AuditIssues {
  pub duplicate_groups: Vec<DuplicateGroup>,
  pub orphaned_task_ids: Vec<Uuid>,
  pub projects_missing_client: Vec<Uuid>,
}

#[derive(Debug, Default, Serialize)]
pub struct RemediationSummary {
  pub merged_groups: u64,
  pub merge_errors: Vec<String>,
  pub orphans_assigned: u64,
  pub clients_assigned: u64,
}

// ──────────────────────────────────────────────────
// Keeper election (pure)
// ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub(crate) struct KeeperStats {
  pub children: u64,
  pub members: u64,
  pub created_at: DateTime<Utc>,
}

/// Pick the merge keeper: most children, then most members, then oldest.
pub(crate) fn elect_keeper(stats: &[KeeperStats]) -> usize {
  let mut best = 0;
  for (i, candidate) in stats.iter().enumerate().skip(1) {
    let incumbent = &stats[best];
    let wins = (candidate.children, candidate.members, std::cmp::Reverse(candidate.created_at))
      > (incumbent.children, incumbent.members, std::cmp::Reverse(incumbent.created_at));
    if wins {
      best = i;
    }
  }
  best
}

// ──────────────────────────────────────────────────
// Detection
// ──────────────────────────────────────────────────

impl Auditor {
  /// Full audit pass: detect issues, persist a report, return it.
  pub async fn run_audit(
    db: &DatabaseConnection,
  ) -> Result<data_quality_report::Model, AppError> {
    let (metrics, issues) = Self::detect(db).await?;

    let report = data_quality_report::ActiveModel {
      id: Set(Uuid::new_v4()),
      metrics: Set(serde_json::to_value(&metrics)?),
      issues: Set(serde_json::to_value(&issues)?),
      resolutions: Set(serde_json::json!({})),
      created_at: Set(Utc::now().into()),
    };

    let model = data_quality_report::Entity::insert(report)
      .exec_with_returning(db)
      .await?;

    tracing::info!(
      duplicate_groups = issues.duplicate_groups.len(),
      orphaned_tasks = issues.orphaned_task_ids.len(),
      projects_missing_client = issues.projects_missing_client.len(),
      "Data-quality audit finished"
    );

    Ok(model)
  }

  async fn detect(db: &DatabaseConnection) -> Result<(AuditMetrics, AuditIssues), AppError> {
    let mut metrics = AuditMetrics::default();
    let mut issues = AuditIssues::default();

    // Duplicate groups by normalized name within type, streamed page by page.
    let mut groups: HashMap<(String, String), Vec<Uuid>> = HashMap::new();
    let mut pages = entity::Entity::find()
      .filter(entity::Column::DeletedAt.is_null())
      .paginate(db, SCAN_PAGE_SIZE);
    while let Some(page) = pages.fetch_and_next().await? {
      for row in page {
        metrics.entities_scanned += 1;
        groups
          .entry((row.entity_type.clone(), normalize_name(&row.name)))
          .or_default()
          .push(row.id);
      }
    }
    for ((entity_type, normalized_name), entity_ids) in groups {
      if entity_ids.len() > 1 && !normalized_name.is_empty() {
        issues.duplicate_groups.push(DuplicateGroup { normalized_name, entity_type, entity_ids });
      }
    }

    // Orphaned tasks and client-less projects.
    issues.orphaned_task_ids = activity::Entity::find()
      .filter(activity::Column::ActivityType.eq(ActivityType::Task.to_string()))
      .filter(activity::Column::ParentId.is_null())
      .filter(activity::Column::DeletedAt.is_null())
      .all(db)
      .await?
      .into_iter()
      .map(|a| a.id)
      .collect();

    issues.projects_missing_client = activity::Entity::find()
      .filter(activity::Column::ActivityType.eq(ActivityType::Project.to_string()))
      .filter(activity::Column::ClientEntityId.is_null())
      .filter(activity::Column::DeletedAt.is_null())
      .all(db)
      .await?
      .into_iter()
      .map(|a| a.id)
      .collect();

    metrics.duplicate_groups = issues.duplicate_groups.len();
    metrics.orphaned_tasks = issues.orphaned_task_ids.len();
    metrics.projects_missing_client = issues.projects_missing_client.len();
    metrics.field_fill_rates = Self::fill_rates(db).await?;

    Ok((metrics, issues))
  }

  async fn fill_rates(db: &DatabaseConnection) -> Result<HashMap<String, f64>, AppError> {
    let mut rates = HashMap::new();

    let total_entities = entity::Entity::find()
      .filter(entity::Column::DeletedAt.is_null())
      .count(db)
      .await?;
    if total_entities > 0 {
      let with_notes = entity::Entity::find()
        .filter(entity::Column::DeletedAt.is_null())
        .filter(entity::Column::Notes.is_not_null())
        .count(db)
        .await?;
      rates.insert("entity.notes".to_owned(), with_notes as f64 / total_entities as f64);
    }

    let total_commitments = commitment::Entity::find()
      .filter(commitment::Column::DeletedAt.is_null())
      .count(db)
      .await?;
    if total_commitments > 0 {
      let with_due = commitment::Entity::find()
        .filter(commitment::Column::DeletedAt.is_null())
        .filter(commitment::Column::DueDate.is_not_null())
        .count(db)
        .await?;
      rates.insert("commitment.due_date".to_owned(), with_due as f64 / total_commitments as f64);
    }

    Ok(rates)
  }

  // ──────────────────────────────────────────────────
  // Remediation
  // ──────────────────────────────────────────────────

  /// Merge each duplicate group into its elected keeper. Errors are isolated
  /// per group.
  pub async fn auto_merge_duplicates(
    db: &DatabaseConnection,
  ) -> Result<RemediationSummary, AppError> {
    let (_, issues) = Self::detect(db).await?;
    let mut summary = RemediationSummary::default();

    for group in issues.duplicate_groups {
      match Self::merge_group(&group.entity_ids, db).await {
        Ok(()) => summary.merged_groups += 1,
        Err(err) => {
          tracing::warn!(
            normalized_name = %group.normalized_name,
            error = %err,
            "Duplicate group merge failed"
          );
          summary.merge_errors.push(format!("{}: {err}", group.normalized_name));
        }
      }
    }

    Ok(summary)
  }

  async fn merge_group(entity_ids: &[Uuid], db: &DatabaseConnection) -> Result<(), AppError> {
    let mut stats = Vec::with_capacity(entity_ids.len());
    for &id in entity_ids {
      let model = EntityStore::get(id, db).await?;
      let facts = entity_fact::Entity::find()
        .filter(entity_fact::Column::EntityId.eq(id))
        .filter(entity_fact::Column::DeletedAt.is_null())
        .count(db)
        .await?;
      let identifiers = entity_identifier::Entity::find()
        .filter(entity_identifier::Column::EntityId.eq(id))
        .count(db)
        .await?;
      let members = entity::Entity::find()
        .filter(entity::Column::OrganizationId.eq(id))
        .filter(entity::Column::DeletedAt.is_null())
        .count(db)
        .await?;
      stats.push(KeeperStats {
        children: facts + identifiers,
        members,
        created_at: model.created_at.to_utc(),
      });
    }

    let keeper = entity_ids[elect_keeper(&stats)];
    for &id in entity_ids {
      if id != keeper {
        EntityStore::merge(id, keeper, db).await?;
      }
    }
    Ok(())
  }

  /// Adopt orphaned tasks: name containment with an active project, then a
  /// shared draft batch, then the owner's single active project, else the
  /// "Unsorted Tasks" container.
  pub async fn auto_assign_orphans(
    db: &DatabaseConnection,
  ) -> Result<RemediationSummary, AppError> {
    let orphans = activity::Entity::find()
      .filter(activity::Column::ActivityType.eq(ActivityType::Task.to_string()))
      .filter(activity::Column::ParentId.is_null())
      .filter(activity::Column::DeletedAt.is_null())
      .all(db)
      .await?;

    let projects = activity::Entity::find()
      .filter(activity::Column::ActivityType.eq(ActivityType::Project.to_string()))
      .filter(activity::Column::Status.eq(ActivityStatus::Active.to_string()))
      .filter(activity::Column::DeletedAt.is_null())
      .all(db)
      .await?;

    let mut summary = RemediationSummary::default();

    for orphan in orphans {
      // Tree maintenance is atomic per orphan.
      let txn = db.begin().await?;

      let parent = match pick_parent(&orphan, &projects) {
        Some(parent) => parent,
        None => match orphan.owner_entity_id {
          Some(owner) => ActivityTree::ensure_unsorted_container(owner, &txn).await?,
          None => {
            txn.rollback().await?;
            continue;
          }
        },
      };

      match ActivityTree::set_parent(orphan.id, Some(parent), &txn).await {
        Ok(()) => {
          txn.commit().await?;
          summary.orphans_assigned += 1;
        }
        Err(err) => {
          txn.rollback().await?;
          tracing::warn!(task_id = %orphan.id, error = %err, "Orphan adoption failed");
        }
      }
    }

    Ok(summary)
  }

  /// Fill in missing project clients from the participant roster of the
  /// segment the project was extracted from.
  pub async fn auto_resolve_clients(
    db: &DatabaseConnection,
  ) -> Result<RemediationSummary, AppError> {
    let projects = activity::Entity::find()
      .filter(activity::Column::ActivityType.eq(ActivityType::Project.to_string()))
      .filter(activity::Column::ClientEntityId.is_null())
      .filter(activity::Column::DeletedAt.is_null())
      .all(db)
      .await?;

    let mut summary = RemediationSummary::default();

    for project in projects {
      let Some(batch) = project
        .metadata
        .as_ref()
        .and_then(|m| m.get("draft_batch_id"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Uuid>().ok())
      else {
        continue;
      };

      let Some(segment) = topical_segment::Entity::find()
        .filter(topical_segment::Column::BatchId.eq(batch))
        .one(db)
        .await?
      else {
        continue;
      };
      let Some(interaction_id) = segment.interaction_id else { continue };

      // Candidate clients: resolved, non-owner roster entities.
      let roster = interaction_participant::Entity::find()
        .filter(interaction_participant::Column::InteractionId.eq(interaction_id))
        .filter(interaction_participant::Column::EntityId.is_not_null())
        .all(db)
        .await?;

      let mut candidates: Vec<Uuid> = Vec::new();
      for participant in roster {
        let Some(entity_id) = participant.entity_id else { continue };
        let Ok(model) = EntityStore::get(entity_id, db).await else { continue };
        if !model.is_owner && !model.is_bot {
          // Prefer organizations as clients.
          if model.entity_type == EntityType::Organization.to_string() {
            candidates.insert(0, entity_id);
          } else {
            candidates.push(entity_id);
          }
        }
      }
      candidates.dedup();

      // Assign only when the roster is unambiguous.
      if candidates.len() == 1 {
        activity::Entity::update_many()
          .col_expr(activity::Column::ClientEntityId, Expr::value(Some(candidates[0])))
          .col_expr(activity::Column::UpdatedAt, Expr::value(Utc::now()))
          .filter(activity::Column::Id.eq(project.id))
          .exec(db)
          .await?;
        summary.clients_assigned += 1;
      }
    }

    Ok(summary)
  }

  /// Composite auto-fix: merge duplicates, adopt orphans, resolve clients,
  /// and persist one report carrying the combined resolutions.
  pub async fn auto_fix(db: &DatabaseConnection) -> Result<RemediationSummary, AppError> {
    let merge = Self::auto_merge_duplicates(db).await?;
    let orphans = Self::auto_assign_orphans(db).await?;
    let clients = Self::auto_resolve_clients(db).await?;

    let summary = RemediationSummary {
      merged_groups: merge.merged_groups,
      merge_errors: merge.merge_errors,
      orphans_assigned: orphans.orphans_assigned,
      clients_assigned: clients.clients_assigned,
    };

    let (metrics, issues) = Self::detect(db).await?;
    let report = data_quality_report::ActiveModel {
      id: Set(Uuid::new_v4()),
      metrics: Set(serde_json::to_value(&metrics)?),
      issues: Set(serde_json::to_value(&issues)?),
      resolutions: Set(serde_json::to_value(&summary)?),
      created_at: Set(Utc::now().into()),
    };
    data_quality_report::Entity::insert(report).exec_without_returning(db).await?;

    Ok(summary)
  }
}

/// Orphan adoption chain: name containment, shared extraction batch, then
/// the owner's single active project. `None` falls through to the
/// "Unsorted Tasks" container.
fn pick_parent(orphan: &activity::Model, projects: &[activity::Model]) -> Option<Uuid> {
  let orphan_name = normalize_name(&orphan.name);

  // (a) Name containment either way.
  if let Some(by_name) = projects.iter().find(|p| {
    let project_name = normalize_name(&p.name);
    !project_name.is_empty()
      && (orphan_name.contains(&project_name) || project_name.contains(&orphan_name))
  }) {
    return Some(by_name.id);
  }

  // (b) Same extraction batch.
  let orphan_batch = orphan.metadata.as_ref().and_then(|m| m.get("draft_batch_id"));
  if let Some(batch) = orphan_batch {
    if let Some(by_batch) = projects
      .iter()
      .find(|p| p.metadata.as_ref().and_then(|m| m.get("draft_batch_id")) == Some(batch))
    {
      return Some(by_batch.id);
    }
  }

  // (c) The owner's single active project.
  if let Some(owner) = orphan.owner_entity_id {
    let owned: Vec<&activity::Model> =
      projects.iter().filter(|p| p.owner_entity_id == Some(owner)).collect();
    if owned.len() == 1 {
      return Some(owned[0].id);
    }
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn stats(children: u64, members: u64, day: u32) -> KeeperStats {
    KeeperStats {
      children,
      members,
      created_at: Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap(),
    }
  }

  #[test]
  fn most_children_wins() {
    let idx = elect_keeper(&[stats(1, 0, 1), stats(5, 0, 20), stats(2, 9, 1)]);
    assert_eq!(idx, 1);
  }

  #[test]
  fn members_break_children_ties() {
    let idx = elect_keeper(&[stats(3, 1, 1), stats(3, 4, 20)]);
    assert_eq!(idx, 1);
  }

  #[test]
  fn oldest_breaks_full_ties() {
    let idx = elect_keeper(&[stats(3, 2, 15), stats(3, 2, 3)]);
    assert_eq!(idx, 1);
  }

  fn make_activity(name: &str, owner: Option<Uuid>, batch: Option<&str>) -> activity::Model {
    let at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap().into();
    activity::Model {
      id: Uuid::new_v4(),
      name: name.to_owned(),
      activity_type: "project".to_owned(),
      status: "active".to_owned(),
      priority: None,
      context: None,
      parent_id: None,
      depth: 0,
      materialized_path: String::new(),
      owner_entity_id: owner,
      client_entity_id: None,
      start_date: None,
      due_date: None,
      completed_at: None,
      tags: Vec::new(),
      needs_review: false,
      review_reason: None,
      confirmation_count: 0,
      metadata: batch.map(|b| serde_json::json!({ "draft_batch_id": b })),
      embedding: None,
      created_at: at,
      updated_at: at,
      deleted_at: None,
    }
  }

  #[test]
  fn adoption_prefers_name_containment() {
    let owner = Uuid::new_v4();
    let website = make_activity("Acme Website", Some(owner), None);
    let other = make_activity("Internal Tooling", Some(owner), Some("b-1"));

    let mut orphan = make_activity("Fix Acme website header", Some(owner), Some("b-1"));
    orphan.activity_type = "task".to_owned();

    let projects = vec![other.clone(), website.clone()];
    // Name containment beats the shared batch with `other`.
    assert_eq!(pick_parent(&orphan, &projects), Some(website.id));
  }

  #[test]
  fn adoption_falls_back_to_shared_batch_then_single_project() {
    let owner = Uuid::new_v4();
    let batch_project = make_activity("Q3 Planning", Some(owner), Some("b-7"));
    let mut orphan = make_activity("Prepare slides", Some(owner), Some("b-7"));
    orphan.activity_type = "task".to_owned();

    assert_eq!(pick_parent(&orphan, std::slice::from_ref(&batch_project)), Some(batch_project.id));

    // No name match, no batch match, but a single owned project.
    let single = make_activity("Only Project", Some(owner), None);
    let mut stray = make_activity("Unrelated chore", Some(owner), Some("b-9"));
    stray.activity_type = "task".to_owned();
    assert_eq!(pick_parent(&stray, std::slice::from_ref(&single)), Some(single.id));
  }

  #[test]
  fn adoption_returns_none_when_ambiguous() {
    let owner = Uuid::new_v4();
    let a = make_activity("Alpha", Some(owner), None);
    let b = make_activity("Beta", Some(owner), None);
    let mut orphan = make_activity("Standalone chore", Some(owner), None);
    orphan.activity_type = "task".to_owned();

    assert_eq!(pick_parent(&orphan, &[a, b]), None);
  }
}
