use chrono::{TimeDelta, Utc};
use plexus_entities::{operator, refresh_token};
use plexus_shared::{APP_ENV, AppError};
use sea_orm::{
  ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, prelude::Expr,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::jwt::{TokenUse, create_token, verify_token};
use super::password::{dummy_verify, verify_password};

pub struct AuthService;

#[derive(Debug, Serialize)]
pub struct TokenPair {
  pub access_token: String,
  pub expires_in: i64,
  #[serde(skip)]
  pub refresh_token: String,
}

fn hash_token(token: &str) -> String {
  format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl AuthService {
  /// Verify credentials and issue a token pair.
  ///
  /// Unknown usernames burn a dummy bcrypt verification so timing does not
  /// leak existence. Repeated failures lock the account.
  pub async fn login(
    username: &str,
    password: &str,
    db: &DatabaseConnection,
  ) -> Result<TokenPair, AppError> {
    let Some(account) = operator::Entity::find()
      .filter(operator::Column::Username.eq(username))
      .one(db)
      .await?
    else {
      dummy_verify(password);
      return Err(AppError::auth("invalid credentials"));
    };

    if let Some(locked_until) = account.locked_until {
      if locked_until.to_utc() > Utc::now() {
        return Err(AppError::auth("account temporarily locked"));
      }
    }

    if !verify_password(password, &account.password_hash)? {
      let attempts = account.failed_attempts + 1;
      let locked_until = (attempts >= APP_ENV.max_login_attempts)
        .then(|| Utc::now() + TimeDelta::minutes(APP_ENV.lockout_duration_minutes));
      // Lock resets the counter so the next window starts clean.
      let stored_attempts = if locked_until.is_some() { 0 } else { attempts };

      operator::Entity::update_many()
        .col_expr(operator::Column::FailedAttempts, Expr::value(stored_attempts))
        .col_expr(operator::Column::LockedUntil, Expr::value(locked_until))
        .col_expr(operator::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(operator::Column::Id.eq(account.id))
        .exec(db)
        .await?;

      if locked_until.is_some() {
        tracing::warn!(username, "Account locked after repeated failures");
      }
      return Err(AppError::auth("invalid credentials"));
    }

    operator::Entity::update_many()
      .col_expr(operator::Column::FailedAttempts, Expr::value(0))
      .col_expr(operator::Column::LockedUntil, Expr::value(Option::<chrono::DateTime<Utc>>::None))
      .col_expr(operator::Column::UpdatedAt, Expr::value(Utc::now()))
      .filter(operator::Column::Id.eq(account.id))
      .exec(db)
      .await?;

    Self::issue_pair(account.id, &account.username, db).await
  }

  /// Rotate a refresh token. Presenting a revoked token is treated as reuse
  /// and revokes every token the user holds.
  pub async fn refresh(token: &str, db: &DatabaseConnection) -> Result<TokenPair, AppError> {
    let claims = verify_token(token, TokenUse::Refresh)?;

    let Some(record) = refresh_token::Entity::find()
      .filter(refresh_token::Column::UserId.eq(claims.sub))
      .filter(refresh_token::Column::Jti.eq(claims.jti))
      .one(db)
      .await?
    else {
      return Err(AppError::auth("unknown refresh token"));
    };

    if record.token_hash != hash_token(token) {
      return Err(AppError::auth("refresh token mismatch"));
    }

    if record.revoked_at.is_some() {
      // Reuse of a rotated token: assume compromise.
      tracing::warn!(user_id = %claims.sub, "Refresh token reuse detected, revoking all tokens");
      Self::revoke_all(claims.sub, db).await?;
      return Err(AppError::auth("refresh token reuse detected"));
    }

    if record.expires_at.to_utc() < Utc::now() {
      return Err(AppError::auth("refresh token expired"));
    }

    // Revoke the presented token, then issue a fresh pair.
    refresh_token::Entity::update_many()
      .col_expr(refresh_token::Column::RevokedAt, Expr::value(Some(Utc::now())))
      .filter(refresh_token::Column::Id.eq(record.id))
      .exec(db)
      .await?;

    Self::issue_pair(claims.sub, &claims.username, db).await
  }

  /// Revoke the presented refresh token.
  pub async fn logout(token: &str, db: &DatabaseConnection) -> Result<(), AppError> {
    let claims = verify_token(token, TokenUse::Refresh)?;
    refresh_token::Entity::update_many()
      .col_expr(refresh_token::Column::RevokedAt, Expr::value(Some(Utc::now())))
      .filter(refresh_token::Column::UserId.eq(claims.sub))
      .filter(refresh_token::Column::Jti.eq(claims.jti))
      .filter(refresh_token::Column::RevokedAt.is_null())
      .exec(db)
      .await?;
    Ok(())
  }

  /// Revoke every live refresh token for a user.
  pub async fn revoke_all(user_id: Uuid, db: &DatabaseConnection) -> Result<(), AppError> {
    refresh_token::Entity::update_many()
      .col_expr(refresh_token::Column::RevokedAt, Expr::value(Some(Utc::now())))
      .filter(refresh_token::Column::UserId.eq(user_id))
      .filter(refresh_token::Column::RevokedAt.is_null())
      .exec(db)
      .await?;
    Ok(())
  }

  /// Create the bootstrap operator account if it does not exist yet.
  pub async fn ensure_operator(
    username: &str,
    password: &str,
    db: &DatabaseConnection,
  ) -> Result<(), AppError> {
    let exists = operator::Entity::find()
      .filter(operator::Column::Username.eq(username))
      .one(db)
      .await?
      .is_some();
    if exists {
      return Ok(());
    }

    let account = operator::ActiveModel {
      id: Set(Uuid::new_v4()),
      username: Set(username.to_owned()),
      password_hash: Set(super::password::hash_password(password)?),
      failed_attempts: Set(0),
      locked_until: Set(None),
      created_at: Set(Utc::now().into()),
      updated_at: Set(Utc::now().into()),
    };
    operator::Entity::insert(account).exec_without_returning(db).await?;
    tracing::info!(username, "Created bootstrap operator");
    Ok(())
  }

  async fn issue_pair(
    user_id: Uuid,
    username: &str,
    db: &DatabaseConnection,
  ) -> Result<TokenPair, AppError> {
    let (access_token, _) = create_token(user_id, username, TokenUse::Access)?;
    let (refresh, refresh_claims) = create_token(user_id, username, TokenUse::Refresh)?;

    let record = refresh_token::ActiveModel {
      id: Set(Uuid::new_v4()),
      user_id: Set(user_id),
      jti: Set(refresh_claims.jti),
      token_hash: Set(hash_token(&refresh)),
      expires_at: Set((Utc::now() + TimeDelta::seconds(APP_ENV.refresh_token_ttl_secs)).into()),
      revoked_at: Set(None),
      created_at: Set(Utc::now().into()),
    };
    refresh_token::Entity::insert(record).exec_without_returning(db).await?;

    Ok(TokenPair {
      access_token,
      expires_in: APP_ENV.access_token_ttl_secs,
      refresh_token: refresh,
    })
  }
}
