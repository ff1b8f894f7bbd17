use axum::{
  Json,
  extract::State,
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use plexus_shared::{APP_ENV, AppError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AuthService, TokenPair, jwt};
use crate::utils::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
  pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
  pub access_token: String,
  pub expires_in: i64,
}

const REFRESH_COOKIE: &str = "refreshToken";

/// The refresh token travels in an httpOnly cookie scoped to /auth.
fn refresh_cookie(value: &str, max_age: i64) -> HeaderValue {
  HeaderValue::from_str(&format!(
    "{REFRESH_COOKIE}={value}; HttpOnly; Path=/auth; Max-Age={max_age}; SameSite=Strict"
  ))
  .expect("cookie value is ASCII")
}

fn cookie_refresh_token(headers: &HeaderMap) -> Option<String> {
  headers
    .get(header::COOKIE)?
    .to_str()
    .ok()?
    .split(';')
    .filter_map(|part| part.trim().split_once('='))
    .find(|(name, _)| *name == REFRESH_COOKIE)
    .map(|(_, value)| value.to_owned())
}

fn pair_response(pair: TokenPair) -> Response {
  let cookie = refresh_cookie(&pair.refresh_token, APP_ENV.refresh_token_ttl_secs);
  let body = Json(TokenResponse {
    access_token: pair.access_token,
    expires_in: pair.expires_in,
  });
  let mut response = body.into_response();
  response.headers_mut().insert(header::SET_COOKIE, cookie);
  response
}

/// Exchange credentials for an access token plus refresh cookie.
#[utoipa::path(
  post,
  path = "/auth/login",
  request_body = LoginRequest,
  responses(
    (status = 200, description = "Authenticated", body = TokenResponse),
    (status = 401, description = "Bad credentials or locked account")
  )
)]
#[axum::debug_handler]
#[tracing::instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
  State(state): State<AppState>,
  Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
  let pair = AuthService::login(&payload.username, &payload.password, &state.db).await?;
  Ok(pair_response(pair))
}

/// Rotate the refresh token (cookie or body) into a fresh pair.
#[utoipa::path(
  post,
  path = "/auth/refresh",
  request_body = RefreshRequest,
  responses(
    (status = 200, description = "Rotated", body = TokenResponse),
    (status = 401, description = "Invalid, expired, or reused refresh token")
  )
)]
#[axum::debug_handler]
#[tracing::instrument(skip_all)]
pub async fn refresh(
  State(state): State<AppState>,
  headers: HeaderMap,
  payload: Option<Json<RefreshRequest>>,
) -> Result<Response, AppError> {
  let token = cookie_refresh_token(&headers)
    .or_else(|| payload.and_then(|Json(p)| p.refresh_token))
    .ok_or_else(|| AppError::auth("missing refresh token"))?;

  let pair = AuthService::refresh(&token, &state.db).await?;
  Ok(pair_response(pair))
}

/// Revoke the presented refresh token.
#[utoipa::path(
  post,
  path = "/auth/logout",
  responses((status = 204, description = "Refresh token revoked"))
)]
#[axum::debug_handler]
#[tracing::instrument(skip_all)]
pub async fn logout(
  State(state): State<AppState>,
  headers: HeaderMap,
  payload: Option<Json<RefreshRequest>>,
) -> Result<StatusCode, AppError> {
  let token = cookie_refresh_token(&headers)
    .or_else(|| payload.and_then(|Json(p)| p.refresh_token))
    .ok_or_else(|| AppError::auth("missing refresh token"))?;

  AuthService::logout(&token, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Revoke every refresh token the user holds.
#[utoipa::path(
  post,
  path = "/auth/logout-all",
  responses((status = 204, description = "All refresh tokens revoked"))
)]
#[axum::debug_handler]
#[tracing::instrument(skip_all)]
pub async fn logout_all(
  State(state): State<AppState>,
  headers: HeaderMap,
  payload: Option<Json<RefreshRequest>>,
) -> Result<StatusCode, AppError> {
  let token = cookie_refresh_token(&headers)
    .or_else(|| payload.and_then(|Json(p)| p.refresh_token))
    .ok_or_else(|| AppError::auth("missing refresh token"))?;

  let claims = jwt::verify_token(&token, jwt::TokenUse::Refresh)?;
  AuthService::revoke_all(claims.sub, &state.db).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cookie_parsing_handles_multiple_pairs() {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::COOKIE,
      HeaderValue::from_static("theme=dark; refreshToken=abc.def.ghi; lang=en"),
    );
    assert_eq!(cookie_refresh_token(&headers), Some("abc.def.ghi".to_owned()));
  }

  #[test]
  fn missing_cookie_is_none() {
    assert_eq!(cookie_refresh_token(&HeaderMap::new()), None);
  }
}
