//! Hierarchy Editor
//!
//! Request/response functions behind the "change parent" flow:
//!
//! 1. [`HierarchyEditor::search_candidates`] - name search returning every
//!    candidate with its validation verdict, so the UI can show rejected ones
//!    inline and only let valid ones be selected.
//! 2. [`HierarchyEditor::save_parent`] - capability check, validation, persist,
//!    then patch the in-memory resolver.
//!
//! Validation failures never reach the override store. The resolver lock is
//! never held while the store call is in flight; two saves racing for the same
//! child are last-write-wins.

use crate::db::{DomainEvent, FieldFilter, OverrideStore, RecordStore, ScanQuery};
use crate::models::{Capability, HierarchyOverride, Record, StoredOverride, SYNTHETIC_ROOT_ID};
use crate::services::error::{HierarchyRejection, ServiceError};
use crate::services::hierarchy_resolver::HierarchyResolver;
use crate::services::hierarchy_validator::validate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

/// Default number of candidates returned by a search
pub const DEFAULT_CANDIDATE_LIMIT: usize = 25;

/// A search hit paired with its validation verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentCandidate {
    pub record: Arc<Record>,
    /// Why the candidate cannot be selected, if it cannot
    pub rejection: Option<HierarchyRejection>,
}

impl ParentCandidate {
    pub fn is_selectable(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Validates and persists hierarchy edits
pub struct HierarchyEditor {
    records: Arc<dyn RecordStore>,
    resolver: Arc<RwLock<HierarchyResolver>>,
    overrides: Arc<dyn OverrideStore>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl HierarchyEditor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        resolver: Arc<RwLock<HierarchyResolver>>,
        overrides: Arc<dyn OverrideStore>,
        event_tx: broadcast::Sender<DomainEvent>,
    ) -> Self {
        Self {
            records,
            resolver,
            overrides,
            event_tx,
        }
    }

    fn record(&self, id: &str) -> Result<Arc<Record>, ServiceError> {
        self.records
            .get_by_key(id)
            .ok_or_else(|| ServiceError::not_found(id))
    }

    /// Resolve a candidate parent id; `None` and the root sentinel mean root
    fn candidate(&self, parent_id: Option<&str>) -> Result<Option<Arc<Record>>, ServiceError> {
        match parent_id {
            None | Some(SYNTHETIC_ROOT_ID) => Ok(None),
            Some(id) => self.record(id).map(Some),
        }
    }

    /// Validate `child_id -> parent_id` against the current hierarchy
    pub async fn check_parent(
        &self,
        child_id: &str,
        parent_id: Option<&str>,
    ) -> Result<(), ServiceError> {
        let child = self.record(child_id)?;
        let candidate = self.candidate(parent_id)?;
        let resolver = self.resolver.read().await;
        validate(&child, candidate.as_deref(), resolver.parent_map())?;
        Ok(())
    }

    /// Records whose name contains `text` (case-insensitive), ordered by name,
    /// each paired with its verdict as a parent for `child_id`
    pub async fn search_candidates(
        &self,
        child_id: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ParentCandidate>, ServiceError> {
        let child = self.record(child_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let query = ScanQuery::new()
            .filter(FieldFilter::contains("name", text))
            .order_by("name", false)
            .limit(limit);
        let hits = self.records.scan(&query);

        let resolver = self.resolver.read().await;
        let parents = resolver.parent_map();
        Ok(hits
            .into_iter()
            .map(|record| {
                let rejection = validate(&child, Some(record.as_ref()), parents).err();
                ParentCandidate { record, rejection }
            })
            .collect())
    }

    /// Persist `child_id -> parent_id` (`None` = root) and apply it.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the capability cannot edit
    /// - `NotFound` if the child or the parent is unknown
    /// - `ValidationRejected` if the move is illegal (nothing is persisted)
    /// - `TransportFailure` if the override store fails
    pub async fn save_parent(
        &self,
        capability: &Capability,
        child_id: &str,
        parent_id: Option<&str>,
    ) -> Result<StoredOverride, ServiceError> {
        if !capability.can_edit {
            return Err(ServiceError::unauthorized("edit the hierarchy"));
        }

        let child = self.record(child_id)?;
        let candidate = self.candidate(parent_id)?;
        {
            let resolver = self.resolver.read().await;
            validate(&child, candidate.as_deref(), resolver.parent_map())?;
        }

        let edge = HierarchyOverride::new(child.id.clone(), candidate.map(|c| c.id.clone()));
        let stored = self
            .overrides
            .set(&edge, capability.user.as_deref())
            .await
            .map_err(|e| {
                error!("Failed to save override for {}: {:#}", edge.child_id, e);
                ServiceError::transport(format!("Failed to save override: {}", e))
            })?;

        let previous = self.resolver.write().await.apply_override(&edge)?;
        info!(
            "{} moved {} under {}",
            capability.user.as_deref().unwrap_or("<unknown>"),
            edge.child_id,
            edge.parent_id.as_deref().unwrap_or("<root>")
        );
        let _ = self
            .event_tx
            .send(DomainEvent::override_applied(&edge, previous));

        Ok(stored)
    }
}
