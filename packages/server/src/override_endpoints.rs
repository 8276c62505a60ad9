//! Override Endpoints
//!
//! # Endpoints
//!
//! - `GET /api/overrides` - Every saved override
//! - `POST /api/overrides` - Save a parent change (approved editors only)

use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::auth::require_capability;
use crate::{AppState, HttpError};
use guildscope_core::models::StoredOverride;

/// Body of a parent change
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOverrideInput {
    pub child_id: String,
    /// `null` moves the child to the top level
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// List every saved override
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/overrides
/// ```
async fn list_overrides(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredOverride>>, HttpError> {
    let overrides = state.overrides.list().await.map_err(|e| {
        tracing::error!("Failed to list overrides: {:#}", e);
        HttpError::from_anyhow(e, "DATABASE_ERROR")
    })?;
    Ok(Json(overrides))
}

/// Save a parent change
///
/// The change is validated against the current effective hierarchy before
/// anything is written. Rejections answer 422 with the reason in `details`.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3001/api/overrides \
///   -H "Authorization: Bearer $TOKEN" \
///   -H "Content-Type: application/json" \
///   -d '{"childId": "F1", "parentId": "F2"}'
/// ```
async fn save_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SaveOverrideInput>,
) -> Result<Json<StoredOverride>, HttpError> {
    let capability = require_capability(&state, &headers).await?;
    let stored = state
        .context
        .editor()
        .save_parent(&capability, &input.child_id, input.parent_id.as_deref())
        .await?;
    Ok(Json(stored))
}

/// Create router with override endpoints
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/overrides", get(list_overrides).post(save_override))
        .with_state(state)
}
