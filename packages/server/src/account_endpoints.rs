//! Account Endpoints
//!
//! Accounts register unapproved and receive a bearer token right away. The
//! token only grants anything once an administrator approves the account.
//!
//! # Endpoints
//!
//! - `POST /api/accounts/register` - Register a username, returns its token
//! - `GET /api/accounts/me` - The account and capability behind a token
//! - `GET /api/accounts/pending` - Unapproved accounts (admin)
//! - `POST /api/accounts/:username/approve` - Approve an account (admin)

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{require_account, require_admin};
use crate::{AppState, HttpError};
use guildscope_core::models::{Account, Capability};

const MAX_USERNAME_LENGTH: usize = 64;

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveInput {
    #[serde(default)]
    pub can_edit: bool,
}

/// An account without its token
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub username: String,
    pub approved: bool,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            username: account.username,
            approved: account.approved,
            can_edit: account.can_edit,
            created_at: account.created_at,
        }
    }
}

/// Registration result; the token is only ever shown here
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub account: AccountView,
    pub token: String,
}

/// Token introspection result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub account: AccountView,
    pub capability: Capability,
}

fn db_error(e: anyhow::Error) -> HttpError {
    tracing::error!("Account store failure: {:#}", e);
    HttpError::from_anyhow(e, "DATABASE_ERROR")
}

fn validate_username(username: &str) -> Result<&str, HttpError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(HttpError::invalid_input("Username cannot be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(HttpError::invalid_input(format!(
            "Username exceeds {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(HttpError::invalid_input(
            "Username may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(username)
}

/// Register a new account
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3001/api/accounts/register \
///   -H "Content-Type: application/json" \
///   -d '{"username": "curator"}'
/// ```
async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<RegisterResponse>), HttpError> {
    let username = validate_username(&input.username)?;

    if state.accounts.find(username).await.map_err(db_error)?.is_some() {
        return Err(HttpError::new(
            format!("Username already registered: {}", username),
            "ACCOUNT_EXISTS",
        ));
    }

    let account = state.accounts.register(username).await.map_err(db_error)?;
    tracing::info!("Registered account {} (pending approval)", account.username);

    let token = account.token.clone();
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account: account.into(),
            token,
        }),
    ))
}

/// The account behind the request's token
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/accounts/me -H "Authorization: Bearer $TOKEN"
/// ```
async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, HttpError> {
    let account = require_account(&state, &headers).await?;
    let capability = Capability::from_account(Some(&account));
    Ok(Json(MeResponse {
        account: account.into(),
        capability,
    }))
}

/// Accounts waiting for approval
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/accounts/pending -H "Authorization: Bearer $ADMIN_TOKEN"
/// ```
async fn list_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AccountView>>, HttpError> {
    require_admin(&state, &headers)?;
    let pending = state.accounts.list_pending().await.map_err(db_error)?;
    Ok(Json(pending.into_iter().map(AccountView::from).collect()))
}

/// Approve an account, optionally granting edit rights
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3001/api/accounts/curator/approve \
///   -H "Authorization: Bearer $ADMIN_TOKEN" \
///   -H "Content-Type: application/json" \
///   -d '{"canEdit": true}'
/// ```
async fn approve(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    Json(input): Json<ApproveInput>,
) -> Result<Json<AccountView>, HttpError> {
    require_admin(&state, &headers)?;
    let account = state
        .accounts
        .approve(&username, input.can_edit)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            HttpError::new(format!("Account not found: {}", username), "ACCOUNT_NOT_FOUND")
        })?;
    tracing::info!(
        "Approved account {} (can_edit={})",
        account.username,
        account.can_edit
    );
    Ok(Json(account.into()))
}

/// Create router with account endpoints
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/accounts/register", post(register))
        .route("/api/accounts/me", get(me))
        .route("/api/accounts/pending", get(list_pending))
        .route("/api/accounts/:username/approve", post(approve))
        .with_state(state)
}
