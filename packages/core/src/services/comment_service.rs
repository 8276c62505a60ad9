//! Comment Service - list and post comments on records
//!
//! Comments are append-only. Posting requires an authenticated caller; reading
//! does not.

use crate::db::{CommentStore, DomainEvent, RecordStore};
use crate::models::{Capability, Comment};
use crate::services::error::ServiceError;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::error;

/// Maximum accepted comment length, in characters
pub const MAX_COMMENT_LENGTH: usize = 4000;

pub struct CommentService {
    records: Arc<dyn RecordStore>,
    comments: Arc<dyn CommentStore>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl CommentService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        comments: Arc<dyn CommentStore>,
        event_tx: broadcast::Sender<DomainEvent>,
    ) -> Self {
        Self {
            records,
            comments,
            event_tx,
        }
    }

    /// Comments on `record_id`, oldest first
    pub async fn list(&self, record_id: &str) -> Result<Vec<Comment>, ServiceError> {
        self.comments.list(record_id).await.map_err(|e| {
            error!("Failed to load comments for {}: {:#}", record_id, e);
            ServiceError::transport(format!("Failed to load comments: {}", e))
        })
    }

    /// Append a comment authored by the capability's user
    pub async fn post(
        &self,
        capability: &Capability,
        record_id: &str,
        text: &str,
    ) -> Result<Comment, ServiceError> {
        let Some(author) = capability.user.as_deref() else {
            return Err(ServiceError::unauthorized("post comments"));
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::invalid_input("comment text is empty"));
        }
        if text.chars().count() > MAX_COMMENT_LENGTH {
            return Err(ServiceError::invalid_input(format!(
                "comment text exceeds {} characters",
                MAX_COMMENT_LENGTH
            )));
        }
        if self.records.get_by_key(record_id).is_none() {
            return Err(ServiceError::not_found(record_id));
        }

        let comment = Comment::new(record_id, author, text);
        self.comments.append(&comment).await.map_err(|e| {
            error!("Failed to save comment on {}: {:#}", record_id, e);
            ServiceError::transport(format!("Failed to save comment: {}", e))
        })?;

        let _ = self.event_tx.send(DomainEvent::CommentAdded(comment.clone()));
        Ok(comment)
    }
}
