//! Hierarchy Endpoints
//!
//! The effective hierarchy: embedded parents with saved overrides applied.
//!
//! # Endpoints
//!
//! - `GET /api/hierarchy/children?parent=` - Children of a node (top level if omitted)
//! - `GET /api/hierarchy/:id/parent` - Effective parent of a record
//! - `GET /api/hierarchy/:id/ancestors` - Effective ancestors, nearest first
//! - `GET /api/hierarchy/:id/candidates?q=&limit=` - Parent candidates with verdicts

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{AppState, HttpError};
use guildscope_core::models::{Record, SYNTHETIC_ROOT_ID};
use guildscope_core::services::{ParentCandidate, DEFAULT_CANDIDATE_LIMIT};

/// Upper bound on candidates per search
const MAX_CANDIDATE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ChildrenQuery {
    /// Parent id; omitted or `__root__` for the top level
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

/// Effective parent of a record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentView {
    pub id: String,
    /// `None` when the record sits at the top level
    pub parent_id: Option<String>,
    /// Whether a saved override decides the parent
    pub overridden: bool,
}

fn require_record(state: &AppState, id: &str) -> Result<Arc<Record>, HttpError> {
    state
        .context
        .records()
        .get_by_key(id)
        .ok_or_else(|| HttpError::not_found(id))
}

/// Children of a node in the effective hierarchy, sorted by name
///
/// # Example
///
/// ```bash
/// # Top level
/// curl http://localhost:3001/api/hierarchy/children
///
/// # Children of a genus
/// curl "http://localhost:3001/api/hierarchy/children?parent=F2"
/// ```
async fn get_children(
    State(state): State<AppState>,
    Query(params): Query<ChildrenQuery>,
) -> Result<Json<Vec<Arc<Record>>>, HttpError> {
    let parent = params
        .parent
        .as_deref()
        .filter(|p| !p.is_empty() && *p != SYNTHETIC_ROOT_ID);
    if let Some(parent) = parent {
        require_record(&state, parent)?;
    }
    Ok(Json(state.context.children(parent).await))
}

/// Effective parent of a record
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/hierarchy/F1/parent
/// ```
async fn get_parent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ParentView>, HttpError> {
    require_record(&state, &id)?;
    let resolver = state.context.resolver().read().await;
    Ok(Json(ParentView {
        parent_id: resolver.effective_parent(&id).map(str::to_string),
        overridden: resolver.override_for(&id).is_some(),
        id,
    }))
}

/// Effective ancestors of a record, nearest first, excluding the root
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/hierarchy/F1/ancestors
/// ```
async fn get_ancestors(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Arc<Record>>>, HttpError> {
    require_record(&state, &id)?;
    let chain = state.context.resolver().read().await.ancestors(&id);
    let records = state.context.records();
    Ok(Json(
        chain
            .iter()
            .filter_map(|ancestor| records.get_by_key(ancestor))
            .collect(),
    ))
}

/// Parent candidates for a record, each with its validation verdict
///
/// Rejected candidates are included with a `rejection` so they can be shown
/// disabled.
///
/// # Example
///
/// ```bash
/// curl "http://localhost:3001/api/hierarchy/F1/candidates?q=amanita&limit=10"
/// ```
async fn get_candidates(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<CandidateQuery>,
) -> Result<Json<Vec<ParentCandidate>>, HttpError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_CANDIDATE_LIMIT)
        .min(MAX_CANDIDATE_LIMIT);
    let candidates = state
        .context
        .editor()
        .search_candidates(&id, &params.q, limit)
        .await?;
    Ok(Json(candidates))
}

/// Create router with hierarchy endpoints
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/hierarchy/children", get(get_children))
        .route("/api/hierarchy/:id/parent", get(get_parent))
        .route("/api/hierarchy/:id/ancestors", get(get_ancestors))
        .route("/api/hierarchy/:id/candidates", get(get_candidates))
        .with_state(state)
}
