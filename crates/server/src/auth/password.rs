use std::sync::LazyLock;

use bcrypt::{DEFAULT_COST, hash, verify};
use plexus_shared::AppError;

/// Precomputed hash used to equalize timing for unknown usernames.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
  hash("plexus-dummy-password-for-timing", DEFAULT_COST).expect("bcrypt hash never fails")
});

pub fn hash_password(password: &str) -> Result<String, AppError> {
  hash(password, DEFAULT_COST)
    .map_err(|err| AppError::fatal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
  verify(password, password_hash)
    .map_err(|err| AppError::fatal(format!("failed to verify password: {err}")))
}

/// Burn the same bcrypt work as a real check so a missing username is not
/// distinguishable by response time.
pub fn dummy_verify(password: &str) {
  let _ = verify(password, &DUMMY_HASH);
}
