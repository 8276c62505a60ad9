//! Dataset Records
//!
//! This module defines the `Record` struct, the read-only entity the explorer
//! navigates. Records are loaded once per session and shared as `Arc<Record>`;
//! nothing mutates a record after it has been loaded.
//!
//! # Rank
//!
//! `rank` is the taxonomic depth of a record. Lower values sit closer to the
//! root of the tree. The dataset uses FUNGuild `taxonomicLevel` codes, see
//! [`rank`] for the named levels.
//!
//! # Examples
//!
//! ```rust
//! use guildscope_core::models::{rank, Record};
//!
//! let genus = Record::new("G1", "Amanita", rank::GENUS, None);
//! let species = Record::new("S1", "Amanita muscaria", rank::SPECIES, Some("G1".to_string()));
//!
//! assert!(genus.rank < species.rank);
//! assert_eq!(species.embedded_parent_id.as_deref(), Some("G1"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Id of the sentinel node at the top of the tree.
///
/// Records without a parent are its direct children. It is never stored in the
/// dataset and never has a parent itself.
pub const SYNTHETIC_ROOT_ID: &str = "__root__";

/// Named FUNGuild taxonomic levels.
pub mod rank {
    pub const KEYWORD: i32 = 0;
    pub const PHYLUM: i32 = 3;
    pub const SUBPHYLUM: i32 = 4;
    pub const CLASS: i32 = 5;
    pub const SUBCLASS: i32 = 6;
    pub const ORDER: i32 = 7;
    pub const SUBORDER: i32 = 8;
    pub const FAMILY: i32 = 9;
    pub const SUBFAMILY: i32 = 10;
    pub const TRIBE: i32 = 11;
    pub const SUBTRIBE: i32 = 12;
    pub const GENUS: i32 = 13;
    pub const SUBGENUS: i32 = 14;
    pub const SECTION: i32 = 15;
    pub const SPECIES: i32 = 20;
    pub const SUBSPECIES: i32 = 21;
    pub const VARIETY: i32 = 22;
    pub const FORM: i32 = 24;

    /// Rank used for records whose level is missing or unparseable.
    ///
    /// Nothing can be placed under an unranked record, and any ranked record
    /// may become its parent.
    pub const UNRANKED: i32 = i32::MAX;

    /// Human readable label for a rank code
    pub fn label(rank: i32) -> Option<&'static str> {
        let label = match rank {
            KEYWORD => "keyword",
            PHYLUM => "phylum",
            SUBPHYLUM => "subphylum",
            CLASS => "class",
            SUBCLASS => "subclass",
            ORDER => "order",
            SUBORDER => "suborder",
            FAMILY => "family",
            SUBFAMILY => "subfamily",
            TRIBE => "tribe",
            SUBTRIBE => "subtribe",
            GENUS => "genus",
            SUBGENUS => "subgenus",
            SECTION => "section",
            SPECIES => "species",
            SUBSPECIES => "subspecies",
            VARIETY => "variety",
            FORM => "form",
            _ => return None,
        };
        Some(label)
    }

    const NAMED: [i32; 18] = [
        KEYWORD, PHYLUM, SUBPHYLUM, CLASS, SUBCLASS, ORDER, SUBORDER, FAMILY, SUBFAMILY, TRIBE,
        SUBTRIBE, GENUS, SUBGENUS, SECTION, SPECIES, SUBSPECIES, VARIETY, FORM,
    ];

    /// Rank code for a label such as `"Genus"`, ignoring case
    pub fn from_label(name: &str) -> Option<i32> {
        let name = name.trim();
        NAMED
            .into_iter()
            .find(|&code| label(code).is_some_and(|l| l.eq_ignore_ascii_case(name)))
    }
}

/// A dataset entity with an id, a rank and an optional embedded parent.
///
/// Only `id`, `rank` and `embedded_parent_id` matter to the hierarchy; `name`
/// is used for display and ordering, and everything else (guild, trophic mode,
/// notes, citations, ...) lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub name: String,
    pub rank: i32,
    pub embedded_parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create a record with no descriptive fields
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rank: i32,
        embedded_parent_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rank,
            embedded_parent_id,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style helper for attaching a descriptive field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up a field by name as text.
    ///
    /// The built-in attributes are addressable as `id`, `name`, `rank` and
    /// `parentId`; any other name is looked up in `fields`. Nulls read as
    /// missing, numbers and booleans are rendered as text.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "id" => Some(Cow::Borrowed(self.id.as_str())),
            "name" => Some(Cow::Borrowed(self.name.as_str())),
            "rank" => Some(Cow::Owned(self.rank.to_string())),
            "parentId" => self.embedded_parent_id.as_deref().map(Cow::Borrowed),
            other => match self.fields.get(other)? {
                Value::Null => None,
                Value::String(s) => Some(Cow::Borrowed(s.as_str())),
                Value::Number(n) => Some(Cow::Owned(n.to_string())),
                Value::Bool(b) => Some(Cow::Owned(b.to_string())),
                value => Some(Cow::Owned(value.to_string())),
            },
        }
    }

    /// Label for this record's rank, if the code is a known level
    pub fn rank_label(&self) -> Option<&'static str> {
        rank::label(self.rank)
    }
}
