//! Token extraction.
//!
//! Accepts `Authorization: Bearer <token>` or the `relay_jwt` cookie. The
//! token is only extracted here; verification happens in `ControlService`.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::extract::CookieJar;

use crate::error::AppError;

/// Name of the cookie carrying the token.
pub const TOKEN_COOKIE: &str = "relay_jwt";

/// The caller's raw token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CallerToken(pub String);

/// Pull a token from the headers, preferring the `Authorization` header.
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    if let Some(header) = headers.get(AUTHORIZATION) {
        let value = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".into()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;
        return Ok(token.trim().to_string());
    }

    CookieJar::from_headers(headers)
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))
}

/// Axum middleware: rejects requests without a token and stores it as
/// `CallerToken`.
pub async fn require_token(mut request: Request, next: Next) -> Result<Response, AppError> {
    let token = extract_token(request.headers())?;
    request.extensions_mut().insert(CallerToken(token));
    Ok(next.run(request).await)
}
