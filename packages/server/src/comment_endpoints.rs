//! Comment Endpoints
//!
//! # Endpoints
//!
//! - `GET /api/comments/:record_id` - Comment thread of a record, oldest first
//! - `POST /api/comments/:record_id` - Post a comment (approved accounts only)

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::auth::require_capability;
use crate::{AppState, HttpError};
use guildscope_core::models::Comment;

#[derive(Debug, Deserialize)]
pub struct PostCommentInput {
    pub text: String,
}

/// Comment thread of a record
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/comments/F1
/// ```
async fn list_comments(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<Vec<Comment>>, HttpError> {
    if state.context.records().get_by_key(&record_id).is_none() {
        return Err(HttpError::not_found(&record_id));
    }
    let comments = state.context.comments().list(&record_id).await?;
    Ok(Json(comments))
}

/// Post a comment
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3001/api/comments/F1 \
///   -H "Authorization: Bearer $TOKEN" \
///   -H "Content-Type: application/json" \
///   -d '{"text": "Listed as saprotroph in older sources"}'
/// ```
async fn post_comment(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<PostCommentInput>,
) -> Result<(StatusCode, Json<Comment>), HttpError> {
    let capability = require_capability(&state, &headers).await?;
    let comment = state
        .context
        .comments()
        .post(&capability, &record_id, &input.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Create router with comment endpoints
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/comments/:record_id",
            get(list_comments).post(post_comment),
        )
        .with_state(state)
}
