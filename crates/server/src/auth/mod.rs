pub mod jwt;
pub mod password;
pub mod service;

mod guard;
pub use guard::require_auth;

pub use jwt::{Claims, TokenUse, create_token, looks_like_jwt, verify_token};
pub use password::{hash_password, verify_password};
pub use service::{AuthService, TokenPair};
