use std::{
  backtrace::{Backtrace, BacktraceStatus},
  fmt::Display,
};

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use uuid::Uuid;

/// Classification of a failure, deciding HTTP status and retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Bad input. Never retried.
  Validation,
  /// Resource missing. Benign in idempotent paths.
  NotFound,
  /// State-machine or uniqueness violation.
  Conflict,
  /// Unauthenticated, expired, or insufficient credentials.
  Auth,
  /// LLM, embedding provider, or adapter failure. Retryable.
  Upstream,
  /// DB connection reset, queue hiccup. Retryable.
  Transient,
  /// Invariant violated. Logged, surfaced as 500, never retried.
  Fatal,
}

impl ErrorKind {
  #[must_use]
  pub const fn status_code(self) -> StatusCode {
    match self {
      Self::Validation => StatusCode::BAD_REQUEST,
      Self::NotFound => StatusCode::NOT_FOUND,
      Self::Conflict => StatusCode::CONFLICT,
      Self::Auth => StatusCode::UNAUTHORIZED,
      Self::Upstream => StatusCode::BAD_GATEWAY,
      Self::Transient => StatusCode::SERVICE_UNAVAILABLE,
      Self::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  #[must_use]
  pub const fn is_retryable(self) -> bool {
    matches!(self, Self::Upstream | Self::Transient)
  }
}

#[derive(Debug)]
pub struct AppError {
  err: anyhow::Error,
  kind: ErrorKind,
}

impl AppError {
  pub fn new<E: Into<anyhow::Error>>(kind: ErrorKind, err: E) -> Self {
    Self {
      err: err.into(),
      kind,
    }
  }

  pub fn validation(msg: impl Display) -> Self {
    Self::new(ErrorKind::Validation, anyhow::anyhow!("{msg}"))
  }

  pub fn not_found(msg: impl Display) -> Self {
    Self::new(ErrorKind::NotFound, anyhow::anyhow!("{msg}"))
  }

  pub fn conflict(msg: impl Display) -> Self {
    Self::new(ErrorKind::Conflict, anyhow::anyhow!("{msg}"))
  }

  pub fn auth(msg: impl Display) -> Self {
    Self::new(ErrorKind::Auth, anyhow::anyhow!("{msg}"))
  }

  pub fn upstream<E: Into<anyhow::Error>>(err: E) -> Self {
    Self::new(ErrorKind::Upstream, err)
  }

  pub fn fatal(msg: impl Display) -> Self {
    Self::new(ErrorKind::Fatal, anyhow::anyhow!("{msg}"))
  }

  #[must_use]
  pub const fn kind(&self) -> ErrorKind {
    self.kind
  }

  #[must_use]
  pub const fn status_code(&self) -> StatusCode {
    self.kind.status_code()
  }

  #[must_use]
  pub const fn is_retryable(&self) -> bool {
    self.kind.is_retryable()
  }

  /// Get backtrace from anyhow (requires `RUST_BACKTRACE=1` to capture)
  pub fn backtrace(&self) -> &Backtrace {
    self.err.backtrace()
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    // Correlation id: returned to the caller and logged with the full cause.
    let error_id = Uuid::new_v4();
    tracing::error!(%error_id, kind = ?self.kind, error = %self.err, "request failed");

    let body = if cfg!(debug_assertions) {
      let bt = self.err.backtrace();
      if bt.status() == BacktraceStatus::Captured {
        format!("[{error_id}] {}\nBacktrace:\n{bt}", self.err)
      } else {
        format!("[{error_id}] {}", self.err)
      }
    } else {
      // Sensitive details stay in server logs.
      format!("[{error_id}] {}", concise_message(self.kind))
    };
    (self.status_code(), body).into_response()
  }
}

const fn concise_message(kind: ErrorKind) -> &'static str {
  match kind {
    ErrorKind::Validation => "invalid request",
    ErrorKind::NotFound => "not found",
    ErrorKind::Conflict => "conflict",
    ErrorKind::Auth => "unauthorized",
    ErrorKind::Upstream => "upstream service failed",
    ErrorKind::Transient => "temporarily unavailable",
    ErrorKind::Fatal => "internal error",
  }
}

impl Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{:?}] {}", self.kind, self.err)
  }
}

impl<E> From<E> for AppError
where
  E: Into<anyhow::Error>,
{
  fn from(err: E) -> Self {
    // Unclassified errors from `?` are treated as transient infrastructure
    // failures so queue consumers retry them.
    Self::new(ErrorKind::Transient, err)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_map_to_expected_status_codes() {
    assert_eq!(ErrorKind::Validation.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(ErrorKind::Conflict.status_code(), StatusCode::CONFLICT);
    assert_eq!(ErrorKind::Auth.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(ErrorKind::Fatal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn only_upstream_and_transient_are_retryable() {
    assert!(ErrorKind::Upstream.is_retryable());
    assert!(ErrorKind::Transient.is_retryable());
    assert!(!ErrorKind::Validation.is_retryable());
    assert!(!ErrorKind::Conflict.is_retryable());
    assert!(!ErrorKind::Fatal.is_retryable());
  }

  #[test]
  fn question_mark_conversion_defaults_to_transient() {
    let err: AppError = std::io::Error::other("connection reset").into();
    assert_eq!(err.kind(), ErrorKind::Transient);
  }
}
