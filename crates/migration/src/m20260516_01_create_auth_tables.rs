use sea_orm_migration::{
  prelude::*,
  schema::{integer, text, timestamp_with_time_zone, uuid},
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
          .table(Operator::Table)
          .if_not_exists()
          .col(uuid(Operator::Id).primary_key())
          .col(text(Operator::Username).unique_key())
          .col(text(Operator::PasswordHash))
          .col(integer(Operator::FailedAttempts).default(0))
          .col(timestamp_with_time_zone(Operator::LockedUntil).null())
          .col(timestamp_with_time_zone(Operator::CreatedAt).default(Expr::current_timestamp()))
          .col(timestamp_with_time_zone(Operator::UpdatedAt).default(Expr::current_timestamp()))
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(RefreshToken::Table)
          .if_not_exists()
          .col(uuid(RefreshToken::Id).primary_key())
          .col(uuid(RefreshToken::UserId))
          .col(uuid(RefreshToken::Jti))
          .col(text(RefreshToken::TokenHash))
          .col(timestamp_with_time_zone(RefreshToken::ExpiresAt))
          .col(timestamp_with_time_zone(RefreshToken::RevokedAt).null())
          .col(timestamp_with_time_zone(RefreshToken::CreatedAt).default(Expr::current_timestamp()))
          .foreign_key(
            ForeignKey::create()
              .from(RefreshToken::Table, RefreshToken::UserId)
              .to(Operator::Table, Operator::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .get_connection()
      .execute_raw(Statement::from_string(
        manager.get_database_backend(),
        "CREATE UNIQUE INDEX idx_refresh_token_jti ON refresh_token (user_id, jti);",
      ))
      .await?;

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    for table in [
      Table::drop().table(RefreshToken::Table).to_owned(),
      Table::drop().table(Operator::Table).to_owned(),
    ] {
      manager.drop_table(table).await?;
    }
    Ok(())
  }
}

#[derive(Iden)]
pub enum Operator {
  Table,
  Id,
  Username,
  PasswordHash,
  FailedAttempts,
  LockedUntil,
  CreatedAt,
  UpdatedAt,
}

#[derive(Iden)]
pub enum RefreshToken {
  Table,
  Id,
  UserId,
  Jti,
  TokenHash,
  ExpiresAt,
  RevokedAt,
  CreatedAt,
}
