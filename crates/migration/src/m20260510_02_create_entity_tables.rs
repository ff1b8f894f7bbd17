use sea_orm_migration::{
  prelude::*,
  schema::{
    boolean, custom, date, double, integer, json_binary, text, timestamp_with_time_zone, uuid,
  },
  sea_orm::Statement,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(EntityTable::Table)
          .if_not_exists()
          .col(uuid(EntityTable::Id).primary_key())
          .col(text(EntityTable::EntityType))
          .col(text(EntityTable::Name))
          .col(uuid(EntityTable::OrganizationId).null())
          .col(text(EntityTable::Notes).null())
          .col(boolean(EntityTable::IsOwner).default(false))
          .col(boolean(EntityTable::IsBot).default(false))
          .col(text(EntityTable::CreationSource))
          .col(timestamp_with_time_zone(EntityTable::CreatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(EntityTable::UpdatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(EntityTable::DeletedAt).null())
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(EntityIdentifier::Table)
          .if_not_exists()
          .col(uuid(EntityIdentifier::Id).primary_key())
          .col(uuid(EntityIdentifier::EntityId))
          .col(text(EntityIdentifier::IdentifierType))
          .col(text(EntityIdentifier::IdentifierValue))
          .col(json_binary(EntityIdentifier::Metadata).null())
          .col(
            timestamp_with_time_zone(EntityIdentifier::CreatedAt)
              .default(Expr::current_timestamp()),
          )
          .foreign_key(
            ForeignKey::create()
              .from(EntityIdentifier::Table, EntityIdentifier::EntityId)
              .to(EntityTable::Table, EntityTable::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(EntityFact::Table)
          .if_not_exists()
          .col(uuid(EntityFact::Id).primary_key())
          .col(uuid(EntityFact::EntityId))
          .col(text(EntityFact::FactType))
          .col(text(EntityFact::Category).null())
          .col(text(EntityFact::Value).null())
          .col(date(EntityFact::ValueDate).null())
          .col(json_binary(EntityFact::ValueJson).null())
          .col(text(EntityFact::Source))
          .col(double(EntityFact::Confidence).default(1.0))
          .col(uuid(EntityFact::SourceInteractionId).null())
          .col(timestamp_with_time_zone(EntityFact::ValidFrom).null())
          .col(timestamp_with_time_zone(EntityFact::ValidUntil).null())
          .col(text(EntityFact::Status).default("active"))
          .col(text(EntityFact::Rank).default("normal"))
          .col(uuid(EntityFact::SupersededBy).null())
          .col(boolean(EntityFact::NeedsReview).default(false))
          .col(text(EntityFact::ReviewReason).null())
          .col(integer(EntityFact::ConfirmationCount).default(0))
          .col(json_binary(EntityFact::Metadata).null())
          .col(custom(EntityFact::Embedding, "vector(1536)").null())
          .col(timestamp_with_time_zone(EntityFact::CreatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(EntityFact::UpdatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(EntityFact::DeletedAt).null())
          .foreign_key(
            ForeignKey::create()
              .from(EntityFact::Table, EntityFact::EntityId)
              .to(EntityTable::Table, EntityTable::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(EntityRelation::Table)
          .if_not_exists()
          .col(uuid(EntityRelation::Id).primary_key())
          .col(uuid(EntityRelation::FromEntityId))
          .col(uuid(EntityRelation::ToEntityId))
          .col(text(EntityRelation::RelationType))
          .col(timestamp_with_time_zone(EntityRelation::ValidFrom).null())
          .col(timestamp_with_time_zone(EntityRelation::ValidUntil).null())
          .col(
            timestamp_with_time_zone(EntityRelation::CreatedAt).default(Expr::current_timestamp()),
          )
          .to_owned(),
      )
      .await?;

    for sql in [
      // One source identity maps to exactly one entity.
      "CREATE UNIQUE INDEX idx_entity_identifier_key ON entity_identifier (identifier_type, identifier_value);",
      // Only one owner entity.
      "CREATE UNIQUE INDEX idx_entity_single_owner ON entity (is_owner) WHERE is_owner;",
      // Trigram search over entity names.
      "CREATE INDEX idx_entity_name_trgm ON entity USING gin (name gin_trgm_ops);",
      "CREATE INDEX idx_entity_fact_entity ON entity_fact (entity_id, fact_type) WHERE deleted_at IS NULL;",
      "CREATE INDEX idx_entity_fact_embedding ON entity_fact USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);",
      "CREATE INDEX idx_entity_relation_from ON entity_relation (from_entity_id) WHERE valid_until IS NULL;",
      "CREATE INDEX idx_entity_relation_to ON entity_relation (to_entity_id) WHERE valid_until IS NULL;",
    ] {
      manager
        .get_connection()
        .execute_raw(Statement::from_string(manager.get_database_backend(), sql))
        .await?;
    }

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    for table in [
      Table::drop().table(EntityRelation::Table).to_owned(),
      Table::drop().table(EntityFact::Table).to_owned(),
      Table::drop().table(EntityIdentifier::Table).to_owned(),
      Table::drop().table(EntityTable::Table).to_owned(),
    ] {
      manager.drop_table(table).await?;
    }
    Ok(())
  }
}

#[derive(Iden)]
#[iden = "entity"]
pub enum EntityTable {
  Table,
  Id,
  EntityType,
  Name,
  OrganizationId,
  Notes,
  IsOwner,
  IsBot,
  CreationSource,
  CreatedAt,
  UpdatedAt,
  DeletedAt,
}

#[derive(Iden)]
pub enum EntityIdentifier {
  Table,
  Id,
  EntityId,
  IdentifierType,
  IdentifierValue,
  Metadata,
  CreatedAt,
}

#[derive(Iden)]
pub enum EntityFact {
  Table,
  Id,
  EntityId,
  FactType,
  Category,
  Value,
  ValueDate,
  ValueJson,
  Source,
  Confidence,
  SourceInteractionId,
  ValidFrom,
  ValidUntil,
  Status,
  Rank,
  SupersededBy,
  NeedsReview,
  ReviewReason,
  ConfirmationCount,
  Metadata,
  Embedding,
  CreatedAt,
  UpdatedAt,
  DeletedAt,
}

#[derive(Iden)]
pub enum EntityRelation {
  Table,
  Id,
  FromEntityId,
  ToEntityId,
  RelationType,
  ValidFrom,
  ValidUntil,
  CreatedAt,
}
