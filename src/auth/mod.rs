//! Session credentials and entity ownership

pub mod jwt;
pub mod ownership;

pub use jwt::{extract_bearer_token, sign_token, verify_token, AuthError, JwtClaims};
pub use ownership::{OwnershipDecision, OwnershipResolver};
