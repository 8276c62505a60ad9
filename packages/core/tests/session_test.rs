//! Explorer Session Tests
//!
//! Integration tests for the editing and comment flows through
//! `ExplorerContext`, backed by both in-memory and libsql stores:
//!
//! - Saving requires the edit capability; rejected saves persist nothing
//! - Validator rejections never reach the override store
//! - Override upsert replaces the earlier edge and survives a reload
//! - Comment threads are oldest-first and require a signed-in user
//! - Account approval gates the capability

#[cfg(test)]
mod session_tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use guildscope_core::db::{
        AccountStore, CommentStore, DatabaseService, DomainEvent, InMemoryCommentStore,
        InMemoryOverrideStore, InMemoryRecordStore, OverrideStore, SqliteAccountStore,
        SqliteCommentStore, SqliteOverrideStore,
    };
    use guildscope_core::models::{
        rank, Capability, HierarchyOverride, Record, StoredOverride,
    };
    use guildscope_core::services::{ExplorerContext, HierarchyRejection, ServiceError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};

    fn dataset() -> Arc<InMemoryRecordStore> {
        Arc::new(InMemoryRecordStore::new(vec![
            Record::new("FA1", "Amanitaceae", rank::FAMILY, None),
            Record::new("G1", "Amanita", rank::GENUS, Some("FA1".into())),
            Record::new("G2", "Boletus", rank::GENUS, None),
            Record::new("S1", "Amanita muscaria", rank::SPECIES, Some("G1".into())),
            Record::new("S2", "Amanita phalloides", rank::SPECIES, Some("G1".into())),
        ]))
    }

    /// Override store that counts writes
    struct CountingOverrideStore {
        inner: InMemoryOverrideStore,
        writes: AtomicUsize,
    }

    impl CountingOverrideStore {
        fn new() -> Self {
            Self {
                inner: InMemoryOverrideStore::new(),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OverrideStore for CountingOverrideStore {
        async fn list(&self) -> Result<Vec<StoredOverride>> {
            self.inner.list().await
        }

        async fn set(
            &self,
            edge: &HierarchyOverride,
            updated_by: Option<&str>,
        ) -> Result<StoredOverride> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(edge, updated_by).await
        }
    }

    /// Override store whose writes always fail
    struct BrokenOverrideStore;

    #[async_trait]
    impl OverrideStore for BrokenOverrideStore {
        async fn list(&self) -> Result<Vec<StoredOverride>> {
            Ok(Vec::new())
        }

        async fn set(&self, _: &HierarchyOverride, _: Option<&str>) -> Result<StoredOverride> {
            anyhow::bail!("disk full")
        }
    }

    async fn in_memory_context(
        overrides: Arc<dyn OverrideStore>,
    ) -> Result<ExplorerContext> {
        Ok(ExplorerContext::load_in_memory(
            dataset(),
            overrides,
            Arc::new(InMemoryCommentStore::new()),
        )
        .await?)
    }

    /// Helper to create an initialized application database
    async fn create_test_db() -> Result<(DatabaseService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db = DatabaseService::new(temp_dir.path().join("guildscope.db")).await?;
        Ok((db, temp_dir))
    }

    // ========================================================================
    // Save parent
    // ========================================================================

    #[tokio::test]
    async fn test_save_without_capability_persists_nothing() -> Result<()> {
        let store = Arc::new(CountingOverrideStore::new());
        let context = in_memory_context(store.clone()).await?;

        let err = context.save_parent("S1", Some("G2")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        context.sign_in(Capability::reader("visitor")).await;
        let err = context.save_parent("S1", Some("G2")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(context.effective_parent("S1").await.as_deref(), Some("G1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_save_never_reaches_store() -> Result<()> {
        let store = Arc::new(CountingOverrideStore::new());
        let context = in_memory_context(store.clone()).await?;
        context.sign_in(Capability::editor("curator")).await;

        let err = context.save_parent("G1", Some("S1")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ValidationRejected(HierarchyRejection::RankViolation { .. })
        ));

        let err = context.save_parent("G1", Some("G1")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ValidationRejected(HierarchyRejection::SelfParent { .. })
        ));

        let err = context.save_parent("S1", Some("ghost")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_applies_and_emits_event() -> Result<()> {
        let context = in_memory_context(Arc::new(InMemoryOverrideStore::new())).await?;
        context.sign_in(Capability::editor("curator")).await;
        let mut rx = context.subscribe();

        let stored = context.save_parent("S1", Some("G2")).await?;
        assert_eq!(stored.updated_by.as_deref(), Some("curator"));
        assert_eq!(context.effective_parent("S1").await.as_deref(), Some("G2"));

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Event should be emitted within 1 second")
            .expect("Should receive event");
        match event {
            DomainEvent::OverrideApplied {
                child_id,
                parent_id,
                previous_parent_id,
            } => {
                assert_eq!(child_id, "S1");
                assert_eq!(parent_id.as_deref(), Some("G2"));
                assert_eq!(previous_parent_id.as_deref(), Some("G1"));
            }
            other => panic!("Expected OverrideApplied event, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_leaves_hierarchy_untouched() -> Result<()> {
        let context = in_memory_context(Arc::new(BrokenOverrideStore)).await?;
        context.sign_in(Capability::editor("curator")).await;

        let err = context.save_parent("S1", Some("G2")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(context.effective_parent("S1").await.as_deref(), Some("G1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_move_to_root() -> Result<()> {
        let context = in_memory_context(Arc::new(InMemoryOverrideStore::new())).await?;
        context.sign_in(Capability::editor("curator")).await;

        context.save_parent("G1", None).await?;
        assert_eq!(context.effective_parent("G1").await, None);
        let top: Vec<String> = context
            .children(None)
            .await
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(top, vec!["G1", "FA1", "G2"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_candidates_reports_verdicts() -> Result<()> {
        let context = in_memory_context(Arc::new(InMemoryOverrideStore::new())).await?;

        let candidates = context.editor().search_candidates("S1", "amanita", 10).await?;
        let verdicts: Vec<(&str, bool)> = candidates
            .iter()
            .map(|c| (c.record.id.as_str(), c.is_selectable()))
            .collect();
        assert_eq!(
            verdicts,
            vec![("G1", true), ("S1", false), ("S2", false), ("FA1", true)]
        );
        assert_eq!(
            candidates[1].rejection,
            Some(HierarchyRejection::SelfParent { id: "S1".into() })
        );

        assert!(context
            .editor()
            .search_candidates("S1", "   ", 10)
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_override_upsert_replaces_earlier_edge() -> Result<()> {
        let (db, _temp_dir) = create_test_db().await?;
        let overrides: Arc<dyn OverrideStore> = Arc::new(SqliteOverrideStore::new(db.clone()));

        let context = in_memory_context(overrides.clone()).await?;
        context.sign_in(Capability::editor("curator")).await;
        context.save_parent("S1", Some("G2")).await?;
        context.save_parent("S1", None).await?;

        let stored = overrides.list().await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].edge, HierarchyOverride::to_root("S1"));

        // A fresh session sees the latest edge
        let reloaded = in_memory_context(overrides).await?;
        assert_eq!(reloaded.effective_parent("S1").await, None);
        let resolver = reloaded.resolver().read().await;
        assert_eq!(resolver.override_for("S1"), Some(None));
        assert_eq!(resolver.override_for("S2"), None);
        Ok(())
    }

    // ========================================================================
    // Comments
    // ========================================================================

    #[tokio::test]
    async fn test_comment_rules() -> Result<()> {
        let context = in_memory_context(Arc::new(InMemoryOverrideStore::new())).await?;

        let err = context.post_comment("S1", "nice").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        context.sign_in(Capability::reader("visitor")).await;
        let err = context.post_comment("S1", "   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = context.post_comment("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        let comment = context.post_comment("S1", "  Fly agaric  ").await?;
        assert_eq!(comment.text, "Fly agaric");
        assert_eq!(comment.author, "visitor");
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_comments_are_oldest_first() -> Result<()> {
        let (db, _temp_dir) = create_test_db().await?;
        let comments: Arc<dyn CommentStore> = Arc::new(SqliteCommentStore::new(db));
        let context = ExplorerContext::load_in_memory(
            dataset(),
            Arc::new(InMemoryOverrideStore::new()),
            comments,
        )
        .await?;
        context.sign_in(Capability::reader("visitor")).await;
        let mut rx = context.subscribe();

        for text in ["first", "second", "third"] {
            context.post_comment("G1", text).await?;
        }
        context.post_comment("G2", "elsewhere").await?;

        let thread = context.comments().list("G1").await?;
        let texts: Vec<&str> = thread.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);

        let event = rx.recv().await?;
        assert_eq!(event.event_type(), "comment:added");
        Ok(())
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    #[tokio::test]
    async fn test_account_approval_gates_capability() -> Result<()> {
        let (db, _temp_dir) = create_test_db().await?;
        let accounts = SqliteAccountStore::new(db);

        let account = accounts.register("curator").await?;
        assert!(!account.approved);
        assert_eq!(accounts.list_pending().await?.len(), 1);

        let resolved = accounts.resolve_token(&account.token).await?;
        let capability = Capability::from_account(resolved.as_ref());
        assert!(!capability.is_authenticated());
        assert!(!capability.can_edit);

        accounts.approve("curator", true).await?;
        let resolved = accounts.resolve_token(&account.token).await?;
        let capability = Capability::from_account(resolved.as_ref());
        assert_eq!(capability.user.as_deref(), Some("curator"));
        assert!(capability.can_edit);
        assert!(accounts.list_pending().await?.is_empty());

        assert!(accounts.resolve_token("bogus").await?.is_none());
        assert!(accounts.approve("nobody", false).await?.is_none());
        Ok(())
    }
}
