//! Business Services
//!
//! This module contains the core logic of the explorer:
//!
//! - `HierarchyResolver` - effective parent / children with overrides applied
//! - `validate` - structural legality of a parent assignment
//! - `RecordPaneCache` - stack of open record panes with memoized fetches
//! - `HierarchyEditor` - candidate search and the save-parent flow
//! - `CommentService` - comment threads on records
//! - `ExplorerContext` - the session object tying the above together

pub mod comment_service;
pub mod context;
pub mod error;
pub mod hierarchy_editor;
pub mod hierarchy_resolver;
pub mod hierarchy_validator;
pub mod pane_cache;

pub use comment_service::CommentService;
pub use context::ExplorerContext;
pub use error::{HierarchyRejection, ServiceError};
pub use hierarchy_editor::{HierarchyEditor, ParentCandidate, DEFAULT_CANDIDATE_LIMIT};
pub use hierarchy_resolver::{EffectiveParentMap, HierarchyResolver};
pub use hierarchy_validator::{is_ancestor, validate, ParentLookup};
pub use pane_cache::{OpenOutcome, PaneEntry, PaneEvent, PaneState, RecordPaneCache};
