//! Hierarchy Resolver
//!
//! Answers "what is this record's current parent" and "what are this record's
//! children", honoring overrides.
//!
//! # Effective parent map
//!
//! The resolver keeps an [`EffectiveParentMap`] with exactly one entry per
//! known record: the record's embedded parent, replaced by the override's
//! parent when one exists. Entries never point outside the known record set;
//! a dangling embedded parent or an override naming an unknown parent resolves
//! to the root (and is logged).
//!
//! The map is built once when the session loads and is patched in place by
//! [`HierarchyResolver::apply_override`], the only mutator.
//!
//! # Examples
//!
//! ```rust
//! use guildscope_core::db::InMemoryRecordStore;
//! use guildscope_core::models::{HierarchyOverride, Record};
//! use guildscope_core::services::HierarchyResolver;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryRecordStore::new(vec![
//!     Record::new("F1", "Amanita", 0, Some("F2".to_string())),
//!     Record::new("F2", "Agaricaceae", 13, None),
//! ]));
//! let mut resolver = HierarchyResolver::new(store, Vec::new());
//! assert_eq!(resolver.effective_parent("F1"), Some("F2"));
//!
//! resolver.apply_override(&HierarchyOverride::to_root("F1")).unwrap();
//! assert_eq!(resolver.effective_parent("F1"), None);
//! ```

use crate::db::RecordStore;
use crate::models::{HierarchyOverride, Record, SYNTHETIC_ROOT_ID};
use crate::services::error::ServiceError;
use crate::services::hierarchy_validator::ParentLookup;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Derived `id -> effective parent` map (`None` = synthetic root)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveParentMap {
    parents: HashMap<String, Option<String>>,
}

impl EffectiveParentMap {
    /// Build a map from explicit pairs
    pub fn from_pairs<I, C, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, Option<P>)>,
        C: Into<String>,
        P: Into<String>,
    {
        Self {
            parents: pairs
                .into_iter()
                .map(|(child, parent)| (child.into(), parent.map(Into::into)))
                .collect(),
        }
    }

    /// Whether `id` has an entry
    pub fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// All `(child, parent)` entries, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.parents
            .iter()
            .map(|(child, parent)| (child.as_str(), parent.as_deref()))
    }

    fn set(&mut self, child: &str, parent: Option<String>) -> Option<String> {
        self.parents
            .insert(child.to_string(), parent)
            .flatten()
    }
}

impl ParentLookup for EffectiveParentMap {
    fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).and_then(|p| p.as_deref())
    }
}

/// Merges embedded parent links with overrides
pub struct HierarchyResolver {
    records: Arc<dyn RecordStore>,
    parents: EffectiveParentMap,
    /// Active overrides: child id -> parent id (`None` = forced to root)
    overrides: HashMap<String, Option<String>>,
}

impl HierarchyResolver {
    /// Build the resolver from the dataset and the overrides loaded at session start.
    ///
    /// Overrides for unknown children are ignored with a warning.
    pub fn new(records: Arc<dyn RecordStore>, overrides: Vec<HierarchyOverride>) -> Self {
        let mut parents = EffectiveParentMap::default();
        let mut dangling = 0usize;

        for record in records.records() {
            let parent = match record.embedded_parent_id.as_deref() {
                None | Some(SYNTHETIC_ROOT_ID) => None,
                Some(parent) if records.get_by_key(parent).is_some() => Some(parent.to_string()),
                Some(parent) => {
                    dangling += 1;
                    debug!("Record {} names unknown parent {}", record.id, parent);
                    None
                }
            };
            parents.set(&record.id, parent);
        }

        if dangling > 0 {
            warn!(
                "{} records reference parents missing from the dataset; placed under root",
                dangling
            );
        }

        let mut resolver = Self {
            records,
            parents,
            overrides: HashMap::new(),
        };

        let total = overrides.len();
        for edge in overrides {
            if let Err(e) = resolver.apply_override(&edge) {
                warn!("Ignoring stored override for {}: {}", edge.child_id, e);
            }
        }

        info!(
            "Hierarchy resolved: {} records, {} overrides ({} applied)",
            resolver.parents.len(),
            total,
            resolver.overrides.len()
        );

        resolver
    }

    /// The record store this resolver reads from
    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// Current effective parent map (the validator's input)
    pub fn parent_map(&self) -> &EffectiveParentMap {
        &self.parents
    }

    /// Effective parent of `id`: override, else embedded parent, else root (`None`)
    pub fn effective_parent(&self, id: &str) -> Option<&str> {
        if let Some(parent) = self.overrides.get(id) {
            return parent.as_deref();
        }
        self.parents.parent_of(id)
    }

    /// The active override for `id`, if any (`Some(None)` = forced to root)
    pub fn override_for(&self, id: &str) -> Option<Option<&str>> {
        self.overrides.get(id).map(|p| p.as_deref())
    }

    /// Children of `parent` (`None` or the root sentinel = top level), sorted by
    /// name case-insensitively with id as tiebreak.
    ///
    /// Records whose effective parent is `parent` are merged with every
    /// override targeting `parent`, even if the child's embedded parent differs.
    pub fn children(&self, parent: Option<&str>) -> Vec<Arc<Record>> {
        let parent = parent.filter(|p| *p != SYNTHETIC_ROOT_ID);

        let mut ids: HashSet<&str> = self
            .parents
            .iter()
            .filter(|(child, _)| self.effective_parent(child) == parent)
            .map(|(child, _)| child)
            .collect();
        ids.extend(
            self.overrides
                .iter()
                .filter(|(_, target)| target.as_deref() == parent)
                .map(|(child, _)| child.as_str()),
        );

        let mut children: Vec<Arc<Record>> = ids
            .into_iter()
            .filter_map(|id| self.records.get_by_key(id))
            .collect();
        children.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        children
    }

    /// Effective ancestors of `id`, nearest first, excluding the root.
    ///
    /// Stops early if the chain loops back on itself.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut current = self.effective_parent(id);

        while let Some(parent) = current {
            if !seen.insert(parent) {
                warn!("Ancestor chain of {} loops at {}", id, parent);
                break;
            }
            chain.push(parent.to_string());
            current = self.effective_parent(parent);
        }
        chain
    }

    /// Apply a saved override to the in-memory map.
    ///
    /// Returns the previous effective parent. Unknown children are rejected;
    /// an unknown parent resolves to the root.
    pub fn apply_override(
        &mut self,
        edge: &HierarchyOverride,
    ) -> Result<Option<String>, ServiceError> {
        if !self.parents.contains(&edge.child_id) {
            return Err(ServiceError::not_found(&edge.child_id));
        }

        let parent = match edge.parent_id.as_deref() {
            None | Some(SYNTHETIC_ROOT_ID) => None,
            Some(parent) if self.parents.contains(parent) => Some(parent.to_string()),
            Some(parent) => {
                warn!(
                    "Override for {} names unknown parent {}; using root",
                    edge.child_id, parent
                );
                None
            }
        };

        let previous = self.effective_parent(&edge.child_id).map(str::to_string);
        self.overrides.insert(edge.child_id.clone(), parent.clone());
        self.parents.set(&edge.child_id, parent);

        debug!(
            "Applied override {} -> {} (was {})",
            edge.child_id,
            edge.parent_id.as_deref().unwrap_or("<root>"),
            previous.as_deref().unwrap_or("<root>")
        );

        Ok(previous)
    }
}
