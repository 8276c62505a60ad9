//! Override Store - persisted hierarchy edits
//!
//! One active override per child with upsert semantics: saving an override for
//! a child that already has one replaces it (last write wins, no history).
//! The whole collection is loaded at session start; writes are one edge per
//! call with no batch semantics.
//!
//! The store does not check capabilities. Callers (`HierarchyEditor`, the
//! HTTP write path) gate writes before they get here.

use crate::db::error::DatabaseError;
use crate::db::DatabaseService;
use crate::models::{HierarchyOverride, StoredOverride};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence for hierarchy overrides
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Every stored override, ordered by child id
    async fn list(&self) -> Result<Vec<StoredOverride>>;

    /// Insert or replace the override for `edge.child_id`
    async fn set(&self, edge: &HierarchyOverride, updated_by: Option<&str>)
        -> Result<StoredOverride>;
}

/// libsql-backed override store (`hierarchy_overrides` table)
pub struct SqliteOverrideStore {
    db: DatabaseService,
}

impl SqliteOverrideStore {
    /// Wrap an initialized application database
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Unable to parse timestamp '{}'", s))?
            .with_timezone(&Utc))
    }

    fn row_to_override(row: &libsql::Row) -> Result<StoredOverride> {
        let child_id: String = row.get(0).context("Failed to get child_id")?;
        let parent_id: Option<String> = row.get(1).context("Failed to get parent_id")?;
        let updated_by: Option<String> = row.get(2).context("Failed to get updated_by")?;
        let updated_at: String = row.get(3).context("Failed to get updated_at")?;

        Ok(StoredOverride {
            edge: HierarchyOverride {
                child_id,
                parent_id,
            },
            updated_by,
            updated_at: Self::parse_timestamp(&updated_at)?,
        })
    }
}

#[async_trait]
impl OverrideStore for SqliteOverrideStore {
    async fn list(&self) -> Result<Vec<StoredOverride>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                "SELECT child_id, parent_id, updated_by, updated_at
                 FROM hierarchy_overrides ORDER BY child_id",
                (),
            )
            .await
            .map_err(|e| DatabaseError::query("list overrides", e))?;

        let mut overrides = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::query("read override rows", e))?
        {
            overrides.push(Self::row_to_override(&row)?);
        }
        Ok(overrides)
    }

    async fn set(
        &self,
        edge: &HierarchyOverride,
        updated_by: Option<&str>,
    ) -> Result<StoredOverride> {
        let updated_at = Utc::now();
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO hierarchy_overrides (child_id, parent_id, updated_by, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(child_id) DO UPDATE SET
                parent_id = excluded.parent_id,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at",
            (
                edge.child_id.as_str(),
                edge.parent_id.as_deref(),
                updated_by,
                updated_at.to_rfc3339(),
            ),
        )
        .await
        .map_err(|e| DatabaseError::query("upsert override", e))?;

        debug!(
            "Stored override {} -> {}",
            edge.child_id,
            edge.parent_id.as_deref().unwrap_or("<root>")
        );

        Ok(StoredOverride {
            edge: edge.clone(),
            updated_by: updated_by.map(str::to_string),
            updated_at,
        })
    }
}

/// Process-local override store, for tests and offline sessions
#[derive(Default)]
pub struct InMemoryOverrideStore {
    entries: RwLock<HashMap<String, StoredOverride>>,
}

impl InMemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing edges
    pub fn with_overrides(edges: impl IntoIterator<Item = HierarchyOverride>) -> Self {
        let entries = edges
            .into_iter()
            .map(|edge| {
                (
                    edge.child_id.clone(),
                    StoredOverride {
                        edge,
                        updated_by: None,
                        updated_at: Utc::now(),
                    },
                )
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl OverrideStore for InMemoryOverrideStore {
    async fn list(&self) -> Result<Vec<StoredOverride>> {
        let entries = self.entries.read().await;
        let mut overrides: Vec<_> = entries.values().cloned().collect();
        overrides.sort_by(|a, b| a.edge.child_id.cmp(&b.edge.child_id));
        Ok(overrides)
    }

    async fn set(
        &self,
        edge: &HierarchyOverride,
        updated_by: Option<&str>,
    ) -> Result<StoredOverride> {
        let stored = StoredOverride {
            edge: edge.clone(),
            updated_by: updated_by.map(str::to_string),
            updated_at: Utc::now(),
        };
        self.entries
            .write()
            .await
            .insert(edge.child_id.clone(), stored.clone());
        Ok(stored)
    }
}
