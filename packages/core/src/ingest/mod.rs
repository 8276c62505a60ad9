//! Dataset Ingestion
//!
//! Turns a downloaded FUNGuild / NEMAGuild payload into dataset rows:
//!
//! 1. [`extract`] - pull the JSON array out of the response body
//!    (Catalogue of Life rows come from a [`catalogue`] tree walk instead)
//! 2. [`normalize`] - clean each record (`NULL` strings, trimming, level cast)
//! 3. [`merge`] - collapse duplicate taxa (NEMAGuild only)
//! 4. [`writer`] - upsert into a SQLite table, or stop here for a dry run
//!
//! Fetching over HTTP is left to the caller (the `guildscope-ingest` binary)
//! so the pipeline itself stays offline-testable.
//!
//! # Examples
//!
//! ```rust
//! use guildscope_core::ingest::{prepare, IngestProfile};
//!
//! let payload = r#"<pre>[{"guid": "G1", "taxon": "Amanita", "taxonomicLevel": "13"},
//!                       {"guid": "NULL", "taxon": "nameless"}]</pre>"#;
//! let batch = prepare(payload, IngestProfile::Funguild, None).unwrap();
//! assert_eq!(batch.records.len(), 1);
//! assert_eq!(batch.skipped, 1);
//! ```

pub mod catalogue;
pub mod extract;
pub mod merge;
pub mod normalize;
pub mod writer;

pub use catalogue::{walk_tree, ChildrenSource, TreeHarvest, TreeNode, TreeWalk};
pub use extract::{extract_json_array, extract_records};
pub use merge::{dedupe_by_taxon, merge_citations, merge_duplicate_records};
pub use normalize::{normalize, NormalizedRecord};
pub use writer::{upsert_many, UpsertSummary};

use crate::db::{DatabaseError, DatabaseService, InMemoryRecordStore};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    /// The payload carries no parseable JSON array
    #[error("No JSON array found in payload (starts with: {sample})")]
    NoJsonArray { sample: String },

    /// A children list could not be fetched
    #[error("Failed to fetch children of {id}: {message}")]
    Fetch { id: String, message: String },

    /// A children page is not the JSON ChecklistBank documents
    #[error("Invalid children page for {id}: {message}")]
    InvalidTreePage { id: String, message: String },

    /// Unknown `--profile` value
    #[error("Unknown ingest profile: {0}")]
    UnknownProfile(String),

    /// Writing the dataset failed
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Which upstream dataset a payload comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestProfile {
    /// FUNGuild: rows keyed by `guid`
    Funguild,
    /// NEMAGuild: rows keyed by `taxon`, duplicates merged
    Nemaguild,
    /// Catalogue of Life classification walked from ChecklistBank, keyed by
    /// taxon id with parent links
    CatalogueOfLife,
}

impl IngestProfile {
    /// Primary key column of the dataset table
    pub fn key_column(self) -> &'static str {
        match self {
            Self::Funguild | Self::CatalogueOfLife => "guid",
            Self::Nemaguild => "taxon",
        }
    }

    /// Secondary indexes created alongside the table
    pub fn indexed_columns(self) -> &'static [&'static str] {
        match self {
            Self::Funguild => &["taxon", "mbNumber", "trophicMode", "guild", "confidenceRanking"],
            Self::Nemaguild => &["mbNumber", "trophicMode", "guild", "confidenceRanking", "growthForm"],
            Self::CatalogueOfLife => &["taxon", "taxonomicLevel", "parentGuid"],
        }
    }

    pub fn merges_duplicates(self) -> bool {
        matches!(self, Self::Nemaguild)
    }

    /// Whether rows come from a [`catalogue`] tree walk rather than one payload
    pub fn walks_tree(self) -> bool {
        matches!(self, Self::CatalogueOfLife)
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Self::Funguild => "http://www.stbates.org/funguild_db.php",
            Self::Nemaguild => "http://www.stbates.org/nemaguild_db.php",
            Self::CatalogueOfLife => catalogue::DEFAULT_BASE_URL,
        }
    }

    pub fn default_table(self) -> &'static str {
        match self {
            Self::Funguild => "funguild",
            Self::Nemaguild => "nemaguild",
            Self::CatalogueOfLife => "catalogueoflife",
        }
    }

    pub fn default_user_agent(self) -> &'static str {
        match self {
            Self::Funguild => "funguild-ingestor/1.0",
            Self::Nemaguild => "nemaguild-ingestor/1.0",
            Self::CatalogueOfLife => "catalogueoflife-ingestor/1.0",
        }
    }
}

impl fmt::Display for IngestProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_table())
    }
}

impl FromStr for IngestProfile {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "funguild" => Ok(Self::Funguild),
            "nemaguild" => Ok(Self::Nemaguild),
            "catalogueoflife" | "col" => Ok(Self::CatalogueOfLife),
            other => Err(IngestError::UnknownProfile(other.to_string())),
        }
    }
}

/// Normalized records ready to write, with the counts gathered on the way
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch {
    pub profile: IngestProfile,
    pub records: Vec<NormalizedRecord>,
    /// Raw records in the payload, before `limit`
    pub fetched: usize,
    /// Raw records considered after `limit`
    pub processed: usize,
    /// Records dropped for lacking the profile's key field
    pub skipped: usize,
    /// Records folded into another record with the same taxon
    pub duplicates_merged: usize,
}

impl PreparedBatch {
    /// Load the batch straight into an in-memory record store
    pub fn into_store(self) -> InMemoryRecordStore {
        let profile = self.profile;
        InMemoryRecordStore::new(self.records.iter().filter_map(|r| r.to_record(profile)))
    }
}

/// Extract, normalize and (for NEMAGuild) dedupe a payload.
///
/// `limit` keeps only the first N raw records; `None` or `Some(0)` keeps all.
pub fn prepare(
    payload: &str,
    profile: IngestProfile,
    limit: Option<usize>,
) -> Result<PreparedBatch, IngestError> {
    Ok(prepare_rows(extract_records(payload)?, profile, limit))
}

/// Normalize and (for NEMAGuild) dedupe already extracted raw records
pub fn prepare_rows(
    mut raw: Vec<Value>,
    profile: IngestProfile,
    limit: Option<usize>,
) -> PreparedBatch {
    let fetched = raw.len();
    if let Some(limit) = limit.filter(|&n| n > 0) {
        info!("Limiting to first {} records", limit);
        raw.truncate(limit);
    }
    let processed = raw.len();

    let ingested_at = Utc::now();
    let normalized: Vec<NormalizedRecord> = raw
        .iter()
        .filter_map(|item| normalize::normalize_at(item, profile, ingested_at))
        .collect();
    let skipped = processed - normalized.len();

    let (records, duplicates_merged) = if profile.merges_duplicates() {
        dedupe_by_taxon(normalized)
    } else {
        (normalized, 0)
    };

    info!(
        "Fetched {} records. Valid: {}. Skipped (no {}): {}. Duplicates merged: {}",
        fetched,
        records.len(),
        profile.key_column(),
        skipped,
        duplicates_merged
    );

    PreparedBatch {
        profile,
        records,
        fetched,
        processed,
        skipped,
        duplicates_merged,
    }
}

/// Final report of an ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub profile: IngestProfile,
    pub fetched: usize,
    pub processed: usize,
    pub valid: usize,
    pub skipped: usize,
    pub duplicates_merged: usize,
    /// `None` for a dry run
    pub written: Option<UpsertSummary>,
}

/// Prepare `payload` and write it to `table` in `db`, or only count when
/// `db` is `None` (dry run)
pub async fn ingest_payload(
    payload: &str,
    profile: IngestProfile,
    limit: Option<usize>,
    target: Option<(&DatabaseService, &str)>,
) -> Result<IngestSummary, IngestError> {
    let batch = prepare(payload, profile, limit)?;
    write_batch(batch, target).await
}

/// Walk the Catalogue of Life tree from `source` and write it like
/// [`ingest_payload`] does. `walk.limit` bounds the walk itself.
pub async fn ingest_tree(
    source: &dyn ChildrenSource,
    walk: &TreeWalk,
    target: Option<(&DatabaseService, &str)>,
) -> Result<IngestSummary, IngestError> {
    let harvest = walk_tree(source, walk).await?;
    let batch = prepare_rows(harvest.rows, IngestProfile::CatalogueOfLife, None);
    write_batch(batch, target).await
}

async fn write_batch(
    batch: PreparedBatch,
    target: Option<(&DatabaseService, &str)>,
) -> Result<IngestSummary, IngestError> {
    let profile = batch.profile;
    let written = match target {
        Some((db, table)) => {
            info!("Writing {} records to {}", batch.records.len(), db.db_path.display());
            Some(upsert_many(db, table, profile, &batch.records).await?)
        }
        None => {
            info!("Dry run, skipping database writes");
            None
        }
    };

    Ok(IngestSummary {
        profile,
        fetched: batch.fetched,
        processed: batch.processed,
        valid: batch.records.len(),
        skipped: batch.skipped,
        duplicates_merged: batch.duplicates_merged,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RecordStore;

    const NEMA_PAYLOAD: &str = r#"[
        {"taxon": "Mononchus", "guild": "Predator", "citationSource": "A"},
        {"taxon": "Mononchus", "trophicMode": "Predator", "citationSource": "B"},
        {"taxon": "NULL"},
        {"taxon": "Aphelenchoides"}
    ]"#;

    #[test]
    fn test_profile_parsing() {
        assert_eq!("FUNGuild".parse::<IngestProfile>().unwrap(), IngestProfile::Funguild);
        assert_eq!("nemaguild".parse::<IngestProfile>().unwrap(), IngestProfile::Nemaguild);
        assert_eq!("COL".parse::<IngestProfile>().unwrap(), IngestProfile::CatalogueOfLife);
        assert!("colguild".parse::<IngestProfile>().is_err());
        assert_eq!(IngestProfile::Nemaguild.to_string(), "nemaguild");
        assert_eq!(IngestProfile::CatalogueOfLife.to_string(), "catalogueoflife");
        assert!(IngestProfile::CatalogueOfLife.walks_tree());
        assert_eq!(IngestProfile::CatalogueOfLife.key_column(), "guid");
    }

    #[test]
    fn test_prepare_nemaguild_counts() {
        let batch = prepare(NEMA_PAYLOAD, IngestProfile::Nemaguild, None).unwrap();
        assert_eq!(batch.fetched, 4);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.duplicates_merged, 1);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].citation_source.as_deref(), Some("A || B"));
    }

    #[test]
    fn test_prepare_limit() {
        let batch = prepare(NEMA_PAYLOAD, IngestProfile::Nemaguild, Some(1)).unwrap();
        assert_eq!(batch.fetched, 4);
        assert_eq!(batch.processed, 1);
        assert_eq!(batch.records.len(), 1);

        let all = prepare(NEMA_PAYLOAD, IngestProfile::Nemaguild, Some(0)).unwrap();
        assert_eq!(all.processed, 4);
    }

    #[test]
    fn test_batch_into_store() {
        let store = prepare(NEMA_PAYLOAD, IngestProfile::Nemaguild, None)
            .unwrap()
            .into_store();
        assert_eq!(store.len(), 2);
        assert!(store.get_by_key("Mononchus").is_some());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let summary = ingest_payload(NEMA_PAYLOAD, IngestProfile::Nemaguild, None, None)
            .await
            .unwrap();
        assert_eq!(summary.valid, 2);
        assert!(summary.written.is_none());
    }
}
