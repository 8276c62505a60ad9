//! Comment Store - append-only comment threads keyed by record id

use crate::db::error::DatabaseError;
use crate::db::DatabaseService;
use crate::models::Comment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence for comment threads. There is no edit or delete.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Comments on `record_id`, oldest first
    async fn list(&self, record_id: &str) -> Result<Vec<Comment>>;

    /// Append a comment
    async fn append(&self, comment: &Comment) -> Result<()>;
}

/// libsql-backed comment store (`comments` table)
pub struct SqliteCommentStore {
    db: DatabaseService,
}

impl SqliteCommentStore {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    fn row_to_comment(row: &libsql::Row) -> Result<Comment> {
        let id: String = row.get(0).context("Failed to get id")?;
        let record_id: String = row.get(1).context("Failed to get record_id")?;
        let author: String = row.get(2).context("Failed to get author")?;
        let text: String = row.get(3).context("Failed to get text")?;
        let created_at: String = row.get(4).context("Failed to get created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .with_context(|| format!("Unable to parse timestamp '{}'", created_at))?
            .with_timezone(&Utc);

        Ok(Comment {
            id,
            record_id,
            author,
            text,
            created_at,
        })
    }
}

#[async_trait]
impl CommentStore for SqliteCommentStore {
    async fn list(&self, record_id: &str) -> Result<Vec<Comment>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, record_id, author, text, created_at
                 FROM comments WHERE record_id = ?
                 ORDER BY created_at ASC, rowid ASC",
            )
            .await
            .map_err(|e| DatabaseError::query("prepare comment query", e))?;

        let mut rows = stmt
            .query([record_id])
            .await
            .map_err(|e| DatabaseError::query("list comments", e))?;

        let mut comments = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::query("read comment rows", e))?
        {
            comments.push(Self::row_to_comment(&row)?);
        }
        Ok(comments)
    }

    async fn append(&self, comment: &Comment) -> Result<()> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO comments (id, record_id, author, text, created_at) VALUES (?, ?, ?, ?, ?)",
            (
                comment.id.as_str(),
                comment.record_id.as_str(),
                comment.author.as_str(),
                comment.text.as_str(),
                comment.created_at.to_rfc3339(),
            ),
        )
        .await
        .map_err(|e| DatabaseError::query("append comment", e))?;
        Ok(())
    }
}

/// Process-local comment store, for tests and offline sessions
#[derive(Default)]
pub struct InMemoryCommentStore {
    threads: RwLock<HashMap<String, Vec<Comment>>>,
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn list(&self, record_id: &str) -> Result<Vec<Comment>> {
        Ok(self
            .threads
            .read()
            .await
            .get(record_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, comment: &Comment) -> Result<()> {
        self.threads
            .write()
            .await
            .entry(comment.record_id.clone())
            .or_default()
            .push(comment.clone());
        Ok(())
    }
}
