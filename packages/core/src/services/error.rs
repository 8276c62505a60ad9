//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations. The variants
//! follow how failures surface to a user:
//!
//! - **Not found** - permanent for a given id within a session
//! - **Validation rejected** - shown inline next to the candidate, never sent
//!   to the network
//! - **Transport failure** - storage/network error, retried only by an
//!   explicit user action
//! - **Unauthorized** - the write path rejects callers without the capability

use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a child -> candidate parent assignment is structurally illegal
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum HierarchyRejection {
    /// The candidate is the child itself
    #[error("Record {id} cannot be its own parent")]
    SelfParent { id: String },

    /// The candidate does not strictly outrank the child
    #[error("Rank violation: parent rank {parent_rank} must be lower than child rank {child_rank}")]
    #[serde(rename_all = "camelCase")]
    RankViolation { child_rank: i32, parent_rank: i32 },

    /// The child is already an ancestor of the candidate
    #[error("Cycle: {child_id} is an ancestor of {candidate_id}")]
    #[serde(rename_all = "camelCase")]
    Cycle {
        child_id: String,
        candidate_id: String,
    },
}

impl HierarchyRejection {
    /// Short machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            HierarchyRejection::SelfParent { .. } => "self-parent",
            HierarchyRejection::RankViolation { .. } => "rank violation",
            HierarchyRejection::Cycle { .. } => "cycle",
        }
    }
}

/// Service operation errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Record not found by id
    #[error("Record not found: {id}")]
    NotFound { id: String },

    /// Hierarchy edit rejected by the validator
    #[error("Hierarchy edit rejected: {0}")]
    ValidationRejected(#[from] HierarchyRejection),

    /// Network or storage failure
    #[error("Transport failure: {context}")]
    TransportFailure { context: String },

    /// Caller lacks the capability for this action
    #[error("Not authorized to {action}")]
    Unauthorized { action: String },

    /// Malformed request input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),
}

impl ServiceError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a transport failure from any displayable cause
    pub fn transport(context: impl std::fmt::Display) -> Self {
        Self::TransportFailure {
            context: context.to_string(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(action: impl Into<String>) -> Self {
        Self::Unauthorized {
            action: action.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::TransportFailure { .. } | ServiceError::DatabaseError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_reasons() {
        let rejection = HierarchyRejection::RankViolation {
            child_rank: 13,
            parent_rank: 20,
        };
        assert_eq!(rejection.reason(), "rank violation");
        assert!(rejection.to_string().contains("20"));

        let value = serde_json::to_value(&rejection).unwrap();
        assert_eq!(value["reason"], "rankViolation");
        assert_eq!(value["childRank"], 13);
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(ServiceError::transport("connection reset").is_retryable());
        assert!(!ServiceError::not_found("S1").is_retryable());
        assert!(!ServiceError::from(HierarchyRejection::SelfParent { id: "S1".into() })
            .is_retryable());
    }
}
