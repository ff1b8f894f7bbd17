use axum::{
  extract::{Request, State},
  http::header,
  middleware::Next,
  response::Response,
};
use plexus_shared::{APP_ENV, AppError};
use sha2::{Digest, Sha256};

use crate::utils::AppState;

use super::jwt::{TokenUse, looks_like_jwt, verify_token};

/// Dual-auth guard applied to every non-public route:
/// `Authorization: Bearer <jwt>`, or an API key via `X-API-Key`,
/// `Authorization`, or `?api_key=` (for webhooks).
pub async fn require_auth(
  State(_state): State<AppState>,
  request: Request,
  next: Next,
) -> Result<Response, AppError> {
  let bearer = request
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim);

  let api_key_header = request
    .headers()
    .get("x-api-key")
    .and_then(|v| v.to_str().ok());

  let api_key_query = request.uri().query().and_then(|q| {
    q.split('&')
      .find_map(|pair| pair.strip_prefix("api_key="))
      .map(ToOwned::to_owned)
  });

  let authorized = match bearer {
    // A well-formed JWT is validated as an access token; anything else in
    // the Authorization header is treated as an API key.
    Some(token) if looks_like_jwt(token) => {
      verify_token(token, TokenUse::Access)?;
      true
    }
    Some(key) => api_key_matches(key),
    None => match (api_key_header, api_key_query.as_deref()) {
      (Some(key), _) => api_key_matches(key),
      (None, Some(key)) => api_key_matches(key),
      (None, None) => false,
    },
  };

  if !authorized {
    return Err(AppError::auth("missing or invalid credentials"));
  }

  Ok(next.run(request).await)
}

/// Constant-time API key comparison via digest equality.
fn api_key_matches(candidate: &str) -> bool {
  let expected = Sha256::digest(APP_ENV.api_key.as_bytes());
  let provided = Sha256::digest(candidate.as_bytes());
  expected == provided
}
