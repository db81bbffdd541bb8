//! JWT token generation and verification.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info};

use super::AuthError;
use crate::models::auth::{AuthClaims, ClaimsData, UserIdentity};

/// Token lifetime in days.
pub const TOKEN_VALIDITY_DAYS: i64 = 7;

/// Issue a signed token (HS256) scoped to `installation_ids`.
pub fn issue_token(
    user: &UserIdentity,
    installation_ids: &[i64],
    secret: &[u8],
) -> Result<String, AuthError> {
    issue_token_with_validity(
        user,
        installation_ids,
        secret,
        Duration::days(TOKEN_VALIDITY_DAYS),
    )
}

/// Issue a token with an explicit lifetime.
pub fn issue_token_with_validity(
    user: &UserIdentity,
    installation_ids: &[i64],
    secret: &[u8],
    validity: Duration,
) -> Result<String, AuthError> {
    if installation_ids.is_empty() {
        return Err(AuthError::TokenError(
            "a token must cover at least one installation".into(),
        ));
    }
    let now = Utc::now();
    let claims = AuthClaims {
        iss: installation_ids.iter().map(i64::to_string).collect(),
        data: ClaimsData { user: user.clone() },
        exp: (now + validity).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify a token, returning its claims.
///
/// Signature and expiry failures are `InvalidToken`; a correctly signed token
/// without a usable issuer set or user payload is `MalformedToken`.
pub fn verify_token(token: &str, secret: &[u8]) -> Result<AuthClaims, AuthError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let raw = decode::<serde_json::Value>(token, &key, &validation).map_err(|e| {
        debug!(error = %e, "token rejected");
        match e.kind() {
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::MalformedToken(format!("missing claim `{claim}`"))
            }
            _ => AuthError::InvalidToken,
        }
    })?;

    let claims: AuthClaims = serde_json::from_value(raw.claims)
        .map_err(|e| AuthError::MalformedToken(e.to_string()))?;

    if claims.iss.is_empty() {
        return Err(AuthError::MalformedToken("empty issuer set".into()));
    }
    Ok(claims)
}

/// Check that `claims` cover `iid`.
pub fn authorize(claims: &AuthClaims, iid: i64) -> Result<(), AuthError> {
    if claims.can_access(iid) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(iid))
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("relay")
        .join("jwt-secret")
}
