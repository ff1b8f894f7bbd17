use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use plexus_shared::{APP_ENV, AppError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
  Access,
  Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  /// Operator id.
  pub sub: Uuid,
  pub username: String,
  /// Token id; refresh tokens are tracked by `(sub, jti)`.
  pub jti: Uuid,
  pub token_use: TokenUse,
  pub exp: i64,
  pub iat: i64,
}

/// Cheap shape test separating JWTs from API keys: three base64 sections, the
/// first being an encoded JSON header (`{"` → `eyJ`).
#[must_use]
pub fn looks_like_jwt(token: &str) -> bool {
  token.starts_with("eyJ") && token.split('.').count() == 3
}

pub fn create_token(
  user_id: Uuid,
  username: &str,
  token_use: TokenUse,
) -> Result<(String, Claims), AppError> {
  let ttl = match token_use {
    TokenUse::Access => APP_ENV.access_token_ttl_secs,
    TokenUse::Refresh => APP_ENV.refresh_token_ttl_secs,
  };

  let now = Utc::now().timestamp();
  let claims = Claims {
    sub: user_id,
    username: username.to_owned(),
    jti: Uuid::new_v4(),
    token_use,
    exp: now + ttl,
    iat: now,
  };

  let token = encode(
    &Header::default(),
    &claims,
    &EncodingKey::from_secret(APP_ENV.jwt_secret.as_bytes()),
  )
  .map_err(|err| AppError::auth(format!("failed to sign token: {err}")))?;

  Ok((token, claims))
}

pub fn verify_token(token: &str, expected_use: TokenUse) -> Result<Claims, AppError> {
  let data = decode::<Claims>(
    token,
    &DecodingKey::from_secret(APP_ENV.jwt_secret.as_bytes()),
    &Validation::default(),
  )
  .map_err(|err| AppError::auth(format!("invalid token: {err}")))?;

  if data.claims.token_use != expected_use {
    return Err(AppError::auth("wrong token type"));
  }
  Ok(data.claims)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn jwt_shape_detection() {
    assert!(looks_like_jwt("eyJhbGciOi.eyJzdWIiOi.sig"));
    assert!(!looks_like_jwt("plain-api-key"));
    assert!(!looks_like_jwt("eyJonly.twoparts"));
    assert!(!looks_like_jwt("a.b.c"));
  }
}
