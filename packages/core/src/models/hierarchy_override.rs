//! Hierarchy Overrides
//!
//! An override is a persisted edge that replaces a record's embedded parent for
//! display and validation. There is at most one override per child; saving a
//! second one for the same child replaces the first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed `child -> parent` edge.
///
/// `parent_id == None` forces the child under the synthetic root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyOverride {
    pub child_id: String,
    pub parent_id: Option<String>,
}

impl HierarchyOverride {
    pub fn new(child_id: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            child_id: child_id.into(),
            parent_id,
        }
    }

    /// Override that moves `child_id` to the synthetic root
    pub fn to_root(child_id: impl Into<String>) -> Self {
        Self::new(child_id, None)
    }
}

/// An override as stored, with who saved it and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOverride {
    #[serde(flatten)]
    pub edge: HierarchyOverride,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}
