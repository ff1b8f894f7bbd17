use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Join table: which messages belong to which topical segment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "segment_message")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub segment_id: Uuid,
  #[sea_orm(primary_key, auto_increment = false)]
  pub message_id: Uuid,
  /// Position of the message inside the segment.
  pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::topical_segment::Entity",
    from = "Column::SegmentId",
    to = "super::topical_segment::Column::Id"
  )]
  TopicalSegment,
  #[sea_orm(
    belongs_to = "super::message::Entity",
    from = "Column::MessageId",
    to = "super::message::Column::Id"
  )]
  Message,
}

impl Related<super::topical_segment::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::TopicalSegment.def()
  }
}

impl Related<super::message::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Message.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
