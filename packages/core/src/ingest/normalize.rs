//! Record normalization
//!
//! Every source field is trimmed; the literal string `NULL` (any case) and
//! empty strings become null. `taxonomicLevel` is cast to an integer when
//! possible. `parentGuid`, when the source carries one, links the record to
//! its parent row. The untouched source object is kept alongside as
//! `raw_json`.

use crate::ingest::IngestProfile;
use crate::models::{rank, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One source record after cleanup, in the column layout of the dataset table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub guid: Option<String>,
    pub taxon: Option<String>,
    pub mb_number: Option<String>,
    pub taxonomic_level: Option<i64>,
    pub parent_guid: Option<String>,
    pub trophic_mode: Option<String>,
    pub guild: Option<String>,
    pub confidence_ranking: Option<String>,
    pub growth_form: Option<String>,
    #[serde(rename = "trait")]
    pub trait_name: Option<String>,
    pub notes: Option<String>,
    pub citation_source: Option<String>,
    #[serde(rename = "raw_json")]
    pub raw_json: String,
    #[serde(rename = "ingested_at")]
    pub ingested_at: DateTime<Utc>,
}

/// Trimmed text of a JSON value, or `None` for null / empty / `"NULL"`
pub fn clean_str(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() || text.eq_ignore_ascii_case("NULL") {
        None
    } else {
        Some(text)
    }
}

/// Normalize one raw record, stamping it with the current time
pub fn normalize(raw: &Value, profile: IngestProfile) -> Option<NormalizedRecord> {
    normalize_at(raw, profile, Utc::now())
}

/// Normalize one raw record.
///
/// Returns `None` when the record is not an object or lacks the profile's key
/// field (`taxon` for NEMAGuild, `guid` otherwise).
pub fn normalize_at(
    raw: &Value,
    profile: IngestProfile,
    ingested_at: DateTime<Utc>,
) -> Option<NormalizedRecord> {
    let obj = raw.as_object()?;
    let field = |name: &str| clean_str(obj.get(name));

    let record = NormalizedRecord {
        guid: field("guid"),
        taxon: field("taxon"),
        mb_number: field("mbNumber"),
        taxonomic_level: field("taxonomicLevel").and_then(|level| level.parse().ok()),
        parent_guid: field("parentGuid"),
        trophic_mode: field("trophicMode"),
        guild: field("guild"),
        confidence_ranking: field("confidenceRanking"),
        growth_form: field("growthForm"),
        trait_name: field("trait"),
        notes: field("notes"),
        citation_source: field("citationSource"),
        raw_json: raw.to_string(),
        ingested_at,
    };

    record.key(profile)?;
    Some(record)
}

impl NormalizedRecord {
    /// Value of the profile's primary key column
    pub fn key(&self, profile: IngestProfile) -> Option<&str> {
        match profile {
            IngestProfile::Funguild | IngestProfile::CatalogueOfLife => self.guid.as_deref(),
            IngestProfile::Nemaguild => self.taxon.as_deref(),
        }
    }

    /// Descriptive columns other than the hierarchy attributes, in table order
    pub fn descriptive_fields(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("mbNumber", self.mb_number.as_deref()),
            ("trophicMode", self.trophic_mode.as_deref()),
            ("guild", self.guild.as_deref()),
            ("confidenceRanking", self.confidence_ranking.as_deref()),
            ("growthForm", self.growth_form.as_deref()),
            ("trait", self.trait_name.as_deref()),
            ("notes", self.notes.as_deref()),
            ("citationSource", self.citation_source.as_deref()),
        ]
    }

    /// Convert into an explorer `Record` keyed the way the profile keys rows.
    ///
    /// Returns `None` if the key field is missing.
    pub fn to_record(&self, profile: IngestProfile) -> Option<Record> {
        let id = self.key(profile)?.to_string();
        let name = self.taxon.clone().unwrap_or_else(|| id.clone());
        let level = self
            .taxonomic_level
            .and_then(|level| i32::try_from(level).ok())
            .unwrap_or(rank::UNRANKED);

        let mut record = Record::new(id, name, level, self.parent_guid.clone());
        if profile == IngestProfile::Nemaguild {
            if let Some(guid) = &self.guid {
                record = record.with_field("guid", guid.as_str());
            }
        }
        for (column, value) in self.descriptive_fields() {
            if let Some(value) = value {
                record = record.with_field(column, value);
            }
        }
        Some(record)
    }
}
