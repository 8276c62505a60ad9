//! Domain Events
//!
//! Events emitted when persisted state changes, so the presentation layer can
//! react (refresh a tree branch, append to an open comment thread) without the
//! services holding references to UI elements.
//!
//! # Architecture
//!
//! Events are emitted using tokio's broadcast channel, allowing multiple
//! subscribers to receive notifications asynchronously. Having no subscriber
//! is not an error.

use crate::models::{Comment, HierarchyOverride};
use serde::{Deserialize, Serialize};

/// Domain events emitted by the editing and comment services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    /// An override was persisted and applied to the in-memory hierarchy
    #[serde(rename_all = "camelCase")]
    OverrideApplied {
        child_id: String,
        parent_id: Option<String>,
        /// Effective parent before the override was applied
        previous_parent_id: Option<String>,
    },

    /// A comment was appended to a record's thread
    CommentAdded(Comment),
}

impl DomainEvent {
    /// Event for an override that replaced `previous_parent_id`
    pub fn override_applied(edge: &HierarchyOverride, previous_parent_id: Option<String>) -> Self {
        DomainEvent::OverrideApplied {
            child_id: edge.child_id.clone(),
            parent_id: edge.parent_id.clone(),
            previous_parent_id,
        }
    }

    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            DomainEvent::OverrideApplied { .. } => "override:applied",
            DomainEvent::CommentAdded(_) => "comment:added",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: the wire format is internally tagged
    #[test]
    fn test_override_applied_serialization_contract() {
        let event =
            DomainEvent::override_applied(&HierarchyOverride::new("F1", None), Some("F2".into()));

        let parsed: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed["type"], "overrideApplied");
        assert_eq!(parsed["childId"], "F1");
        assert!(parsed["parentId"].is_null());
        assert_eq!(parsed["previousParentId"], "F2");
        assert_eq!(event.event_type(), "override:applied");
    }

    #[test]
    fn test_comment_added_event_type() {
        let event = DomainEvent::CommentAdded(Comment::new("S1", "curator", "Check spore print"));
        let parsed: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed["type"], "commentAdded");
        assert_eq!(parsed["recordId"], "S1");
        assert_eq!(event.event_type(), "comment:added");
    }
}
