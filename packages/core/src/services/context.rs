//! Explorer Context
//!
//! The explicit session context: one object owning the dataset, the hierarchy
//! resolver, the stores, the pane cache and the services built on them. It is
//! created once per session (or once per server process) and handed to
//! whatever needs it, instead of living in globals.
//!
//! # Examples
//!
//! ```rust
//! use guildscope_core::db::{InMemoryCommentStore, InMemoryOverrideStore, InMemoryRecordStore};
//! use guildscope_core::models::{rank, Capability, Record};
//! use guildscope_core::services::ExplorerContext;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryRecordStore::new(vec![
//!     Record::new("G1", "Amanita", rank::GENUS, None),
//!     Record::new("S1", "Amanita muscaria", rank::SPECIES, None),
//! ]));
//! let context = ExplorerContext::load_in_memory(
//!     store,
//!     Arc::new(InMemoryOverrideStore::new()),
//!     Arc::new(InMemoryCommentStore::new()),
//! )
//! .await?;
//!
//! context.sign_in(Capability::editor("curator")).await;
//! context.save_parent("S1", Some("G1")).await?;
//! assert_eq!(context.effective_parent("S1").await.as_deref(), Some("G1"));
//! # Ok(())
//! # }
//! ```

use crate::db::{
    CommentStore, DomainEvent, InMemoryRecordStore, OverrideStore, RecordFetcher, RecordStore,
};
use crate::models::{Capability, Comment, Record, StoredOverride};
use crate::services::comment_service::CommentService;
use crate::services::error::ServiceError;
use crate::services::hierarchy_editor::HierarchyEditor;
use crate::services::hierarchy_resolver::HierarchyResolver;
use crate::services::pane_cache::RecordPaneCache;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

/// Broadcast channel capacity for domain events.
const DOMAIN_EVENT_CHANNEL_CAPACITY: usize = 128;

pub struct ExplorerContext {
    records: Arc<dyn RecordStore>,
    resolver: Arc<RwLock<HierarchyResolver>>,
    panes: RecordPaneCache,
    editor: HierarchyEditor,
    comments: CommentService,
    capability: RwLock<Capability>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl ExplorerContext {
    /// Load a session: read every stored override and build the resolver.
    ///
    /// `fetcher` is what the pane cache fetches through; for a fully loaded
    /// dataset it is the record store itself.
    pub async fn load(
        records: Arc<dyn RecordStore>,
        fetcher: Arc<dyn RecordFetcher>,
        overrides: Arc<dyn OverrideStore>,
        comments: Arc<dyn CommentStore>,
    ) -> Result<Self, ServiceError> {
        let stored = overrides.list().await.map_err(|e| {
            error!("Failed to load hierarchy overrides: {:#}", e);
            ServiceError::transport(format!("Failed to load overrides: {}", e))
        })?;
        let edges = stored.into_iter().map(|s| s.edge).collect();

        let resolver = Arc::new(RwLock::new(HierarchyResolver::new(records.clone(), edges)));
        let (event_tx, _) = broadcast::channel(DOMAIN_EVENT_CHANNEL_CAPACITY);

        let editor = HierarchyEditor::new(
            records.clone(),
            resolver.clone(),
            overrides,
            event_tx.clone(),
        );
        let comments = CommentService::new(records.clone(), comments, event_tx.clone());

        info!("Explorer session loaded with {} records", records.len());

        Ok(Self {
            records,
            resolver,
            panes: RecordPaneCache::new(fetcher),
            editor,
            comments,
            capability: RwLock::new(Capability::anonymous()),
            event_tx,
        })
    }

    /// Load a session over an in-memory dataset that doubles as the fetcher
    pub async fn load_in_memory(
        records: Arc<InMemoryRecordStore>,
        overrides: Arc<dyn OverrideStore>,
        comments: Arc<dyn CommentStore>,
    ) -> Result<Self, ServiceError> {
        Self::load(records.clone(), records, overrides, comments).await
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn resolver(&self) -> &Arc<RwLock<HierarchyResolver>> {
        &self.resolver
    }

    pub fn panes(&self) -> &RecordPaneCache {
        &self.panes
    }

    pub fn editor(&self) -> &HierarchyEditor {
        &self.editor
    }

    pub fn comments(&self) -> &CommentService {
        &self.comments
    }

    /// Subscribe to override and comment events
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Replace the session's capability (after login / logout)
    pub async fn sign_in(&self, capability: Capability) {
        *self.capability.write().await = capability;
    }

    pub async fn capability(&self) -> Capability {
        self.capability.read().await.clone()
    }

    /// Whether edit affordances should be shown
    pub async fn can_edit(&self) -> bool {
        self.capability.read().await.can_edit
    }

    pub async fn effective_parent(&self, id: &str) -> Option<String> {
        self.resolver
            .read()
            .await
            .effective_parent(id)
            .map(str::to_string)
    }

    pub async fn children(&self, parent: Option<&str>) -> Vec<Arc<Record>> {
        self.resolver.read().await.children(parent)
    }

    /// Save a parent change as the signed-in user
    pub async fn save_parent(
        &self,
        child_id: &str,
        parent_id: Option<&str>,
    ) -> Result<StoredOverride, ServiceError> {
        let capability = self.capability().await;
        self.editor.save_parent(&capability, child_id, parent_id).await
    }

    /// Post a comment as the signed-in user
    pub async fn post_comment(&self, record_id: &str, text: &str) -> Result<Comment, ServiceError> {
        let capability = self.capability().await;
        self.comments.post(&capability, record_id, text).await
    }
}
