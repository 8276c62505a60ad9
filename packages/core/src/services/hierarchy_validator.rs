//! Hierarchy Validator
//!
//! Decides whether assigning a candidate parent to a child is structurally
//! legal. Every hierarchy write goes through [`validate`] before it reaches
//! the override store: the editor's candidate search, the editor's save flow
//! and the HTTP write path all call this one function.
//!
//! # Rules
//!
//! 1. Moving a record to the synthetic root (`candidate == None`) is always legal.
//! 2. A record cannot be its own parent.
//! 3. A parent must strictly outrank its child (numerically smaller rank).
//! 4. The child must not already be an ancestor of the candidate.
//!
//! The ancestor walk is bounded by a visited set, so it terminates on maps
//! that already contain a cycle elsewhere.
//!
//! # Examples
//!
//! ```rust
//! use guildscope_core::models::{rank, Record};
//! use guildscope_core::services::{validate, HierarchyRejection};
//! use std::collections::HashMap;
//!
//! let genus = Record::new("G1", "Amanita", rank::GENUS, None);
//! let species = Record::new("S1", "Amanita muscaria", rank::SPECIES, None);
//! let parents: HashMap<String, Option<String>> = HashMap::new();
//!
//! assert!(validate(&species, Some(&genus), &parents).is_ok());
//! assert!(matches!(
//!     validate(&genus, Some(&species), &parents),
//!     Err(HierarchyRejection::RankViolation { .. })
//! ));
//! assert!(validate(&genus, None, &parents).is_ok());
//! ```

use crate::models::{Record, SYNTHETIC_ROOT_ID};
use crate::services::error::HierarchyRejection;
use std::collections::{HashMap, HashSet};

/// Read access to a `child -> parent` map.
///
/// `None` means the id sits under the root (or is unknown to the map).
pub trait ParentLookup {
    fn parent_of(&self, id: &str) -> Option<&str>;
}

impl ParentLookup for HashMap<String, Option<String>> {
    fn parent_of(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(|parent| parent.as_deref())
    }
}

impl ParentLookup for HashMap<String, String> {
    fn parent_of(&self, id: &str) -> Option<&str> {
        self.get(id).map(String::as_str)
    }
}

/// Check whether `candidate` may become the parent of `child`.
///
/// `candidate == None` means the synthetic root. `parents` is the effective
/// parent map the assignment would be applied to.
pub fn validate<M>(
    child: &Record,
    candidate: Option<&Record>,
    parents: &M,
) -> Result<(), HierarchyRejection>
where
    M: ParentLookup + ?Sized,
{
    let Some(candidate) = candidate else {
        return Ok(());
    };
    if candidate.id == SYNTHETIC_ROOT_ID {
        return Ok(());
    }

    if candidate.id == child.id {
        return Err(HierarchyRejection::SelfParent {
            id: child.id.clone(),
        });
    }

    if candidate.rank >= child.rank {
        return Err(HierarchyRejection::RankViolation {
            child_rank: child.rank,
            parent_rank: candidate.rank,
        });
    }

    if is_ancestor(&child.id, &candidate.id, parents) {
        return Err(HierarchyRejection::Cycle {
            child_id: child.id.clone(),
            candidate_id: candidate.id.clone(),
        });
    }

    Ok(())
}

/// Whether `ancestor_id` appears on the chain walked up from `start_id`
/// (including `start_id` itself).
pub fn is_ancestor<M>(ancestor_id: &str, start_id: &str, parents: &M) -> bool
where
    M: ParentLookup + ?Sized,
{
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = Some(start_id);

    while let Some(id) = current {
        if id == ancestor_id {
            return true;
        }
        if id == SYNTHETIC_ROOT_ID || !visited.insert(id) {
            // Reached the root, or looped inside a pre-existing cycle
            return false;
        }
        current = parents.parent_of(id);
    }

    false
}
