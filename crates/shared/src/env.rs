use std::env;
use std::str::FromStr;
use std::sync::LazyLock;

fn required_env(key: &str) -> String {
  env::var(key).expect(&format!("env {key} must be set"))
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
  env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

pub struct AppEnv {
  pub port: u16,
  pub database_url: String,
  pub openai_base_url: String,
  pub openai_api_key: String,
  pub openai_chat_model: String,
  pub embedding_model: String,
  pub embedding_dim: usize,
  pub embedding_max_attempts: u32,

  pub session_gap_hours: i64,
  pub settle_delay_minutes: i64,
  pub min_segment_messages: usize,
  pub max_segment_messages: usize,

  pub auto_resolve_confidence_threshold: f64,
  pub semantic_similarity_threshold: f64,
  pub pending_approval_retention_days: i64,

  pub jwt_secret: String,
  pub api_key: String,
  /// Optional bootstrap operator account created at startup when absent.
  pub operator_username: Option<String>,
  pub operator_password: Option<String>,
  pub max_login_attempts: i32,
  pub lockout_duration_minutes: i64,
  pub access_token_ttl_secs: i64,
  pub refresh_token_ttl_secs: i64,
}

impl AppEnv {
  fn new() -> Self {
    dotenvy::dotenv().ok();

    Self {
      port: env_or("PORT", 3000),
      database_url: required_env("DATABASE_URL"),
      openai_base_url: required_env("OPENAI_BASE_URL"),
      openai_api_key: required_env("OPENAI_API_KEY"),
      openai_chat_model: required_env("OPENAI_CHAT_MODEL"),
      embedding_model: required_env("EMBEDDING_MODEL"),
      embedding_dim: env_or("EMBEDDING_DIM", 1536),
      embedding_max_attempts: env_or("EMBEDDING_MAX_ATTEMPTS", 3),

      session_gap_hours: env_or("SESSION_GAP_HOURS", 4),
      settle_delay_minutes: env_or("SETTLE_DELAY_MINUTES", 30),
      min_segment_messages: env_or("MIN_SEGMENT_MESSAGES", 3),
      max_segment_messages: env_or("MAX_SEGMENT_MESSAGES", 80),

      auto_resolve_confidence_threshold: env_or("AUTO_RESOLVE_CONFIDENCE_THRESHOLD", 0.9),
      semantic_similarity_threshold: env_or("SEMANTIC_SIMILARITY_THRESHOLD", 0.85),
      pending_approval_retention_days: env_or("PENDING_APPROVAL_RETENTION_DAYS", 30),

      jwt_secret: required_env("JWT_SECRET"),
      api_key: required_env("API_KEY"),
      operator_username: env::var("OPERATOR_USERNAME").ok(),
      operator_password: env::var("OPERATOR_PASSWORD").ok(),
      max_login_attempts: env_or("MAX_LOGIN_ATTEMPTS", 5),
      lockout_duration_minutes: env_or("LOCKOUT_DURATION_MINUTES", 15),
      access_token_ttl_secs: env_or("ACCESS_TOKEN_TTL", 900),
      refresh_token_ttl_secs: env_or("REFRESH_TOKEN_TTL", 1_209_600),
    }
  }
}

pub static APP_ENV: LazyLock<AppEnv> = LazyLock::new(AppEnv::new);
