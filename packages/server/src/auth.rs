//! Bearer token resolution
//!
//! Requests carry `Authorization: Bearer <token>`. A token maps to an account
//! through the account store; the account maps to a [`Capability`]. Admin
//! requests compare against the configured admin token instead.

use axum::http::{header, HeaderMap};
use guildscope_core::models::{Account, Capability};
use tracing::error;

use crate::{AppState, HttpError};

/// The bearer token of a request, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The account behind the request's token. Missing or unknown tokens are 401.
pub async fn require_account(state: &AppState, headers: &HeaderMap) -> Result<Account, HttpError> {
    let token = bearer_token(headers).ok_or_else(HttpError::unauthenticated)?;
    state
        .accounts
        .resolve_token(token)
        .await
        .map_err(|e| {
            error!("Token lookup failed: {:#}", e);
            HttpError::from_anyhow(e, "DATABASE_ERROR")
        })?
        .ok_or_else(HttpError::unauthenticated)
}

/// Capability of the request's account (anonymous until approved)
pub async fn require_capability(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Capability, HttpError> {
    let account = require_account(state, headers).await?;
    Ok(Capability::from_account(Some(&account)))
}

/// Byte comparison whose running time depends only on the lengths
fn tokens_match(expected: &str, given: &str) -> bool {
    let (expected, given) = (expected.as_bytes(), given.as_bytes());
    if expected.len() != given.len() {
        return false;
    }
    let diff = expected
        .iter()
        .zip(given)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    diff == 0
}

/// Reject unless the request carries the configured admin token
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), HttpError> {
    let token = bearer_token(headers).ok_or_else(HttpError::unauthenticated)?;
    match state.admin_token.as_deref() {
        Some(admin) if tokens_match(admin, token) => Ok(()),
        Some(_) => Err(HttpError::new("Admin token required", "FORBIDDEN")),
        None => Err(HttpError::new(
            "Account administration is disabled (GUILDSCOPE_ADMIN_TOKEN is unset)",
            "FORBIDDEN",
        )),
    }
}
