//! Authentication and authorization logic.
//!
//! Relay tokens are HS256 JWTs whose `iss` claim lists the installations
//! the bearer may act on. Every control-plane check reduces to membership in
//! that list.

pub mod jwt;

use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad signature, expired, or not a JWT at all.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Verified, but required claims are missing or empty.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("You don't have access to installation {0}")]
    Forbidden(i64),

    #[error("Token error: {0}")]
    TokenError(String),
}
