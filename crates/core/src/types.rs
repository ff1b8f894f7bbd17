use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Enums persisted as TEXT columns. `Display`/`FromStr` give the DB
/// representation; serde mirrors it for the API.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
  Person,
  Organization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreationSource {
  Manual,
  Extracted,
  Imported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
  Manual,
  Extracted,
  Imported,
  Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
  Draft,
  Active,
}

/// Wikidata-style fact ranking; an active fact dominates a deprecated one.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
  ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FactRank {
  Deprecated,
  Normal,
  Preferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
  TelegramSession,
  PhoneCall,
  VideoMeeting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
  Active,
  Completed,
  Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
  Initiator,
  Recipient,
  Participant,
  #[strum(serialize = "self")]
  #[serde(rename = "self")]
  Slf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
  Unprocessed,
  Pending,
  Processed,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
  Pending,
  Resolved,
  Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
  Active,
  Merged,
  Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
  Area,
  Business,
  Direction,
  Project,
  Initiative,
  Task,
  Milestone,
  Habit,
  Learning,
  EventSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
  Draft,
  Idea,
  Active,
  Paused,
  Completed,
  Cancelled,
  Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommitmentType {
  Promise,
  Request,
  Agreement,
  Deadline,
  Reminder,
  Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStatus {
  Draft,
  Pending,
  InProgress,
  Completed,
  Cancelled,
  Overdue,
  Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
  Pending,
  Approved,
  Rejected,
}

/// Approvable draft kinds, dispatched through the item-type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
  Fact,
  Project,
  Task,
  Commitment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
  Employment,
  Team,
  ClientVendor,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn enums_round_trip_through_text() {
    assert_eq!(ItemType::Fact.to_string(), "fact");
    assert_eq!("commitment".parse::<ItemType>().unwrap(), ItemType::Commitment);
    assert_eq!(ParticipantRole::Slf.to_string(), "self");
    assert_eq!("self".parse::<ParticipantRole>().unwrap(), ParticipantRole::Slf);
    assert_eq!(ActivityType::EventSeries.to_string(), "event_series");
    assert_eq!(CommitmentStatus::InProgress.to_string(), "in_progress");
  }

  #[test]
  fn fact_rank_orders_deprecated_lowest() {
    assert!(FactRank::Preferred > FactRank::Normal);
    assert!(FactRank::Normal > FactRank::Deprecated);
  }
}
