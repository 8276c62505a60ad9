//! Dataset loading from SQLite
//!
//! The explorer's dataset is a single SQLite table produced by the ingestion
//! pipeline (`guild` / `taxon` / `taxonomicLevel` columns and friends). It is
//! read once per session into an [`InMemoryRecordStore`]. Which columns carry
//! the id, display name, rank and parent is configurable through
//! [`DatasetColumns`]; every other non-null column becomes a descriptive field.

use crate::db::error::DatabaseError;
use crate::db::record_store::InMemoryRecordStore;
use crate::db::DatabaseService;
use crate::models::{rank, Record};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Ingestion bookkeeping column holding the untouched source record
const RAW_JSON_COLUMN: &str = "raw_json";

/// Whether `table` is safe to interpolate into SQL as an identifier
pub fn is_valid_table_name(table: &str) -> bool {
    static TABLE_NAME: OnceLock<Regex> = OnceLock::new();
    TABLE_NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"))
        .is_match(table)
}

/// Column names the loader maps onto `Record`'s hierarchy attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetColumns {
    pub id: String,
    pub name: String,
    pub rank: String,
    pub parent: String,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        Self {
            id: "guid".to_string(),
            name: "taxon".to_string(),
            rank: "taxonomicLevel".to_string(),
            parent: "parentGuid".to_string(),
        }
    }
}

/// Convert one libsql value into JSON, dropping blobs
fn to_json(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null | libsql::Value::Blob(_) => Value::Null,
        libsql::Value::Integer(i) => Value::from(i),
        libsql::Value::Real(f) => Value::from(f),
        libsql::Value::Text(s) => Value::String(s),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

fn as_rank(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read every row of `table` as a `Record`.
///
/// Rows without an id are skipped with a warning. Rows without a usable rank
/// are loaded as [`rank::UNRANKED`]. Rows without a name fall back to their id.
pub async fn load_records(
    db: &DatabaseService,
    table: &str,
    columns: &DatasetColumns,
) -> Result<Vec<Record>, DatabaseError> {
    if !is_valid_table_name(table) {
        return Err(DatabaseError::InvalidTableName(table.to_string()));
    }

    let conn = db.connect_with_timeout().await?;
    let mut rows = conn
        .query(&format!("SELECT * FROM {}", table), ())
        .await
        .map_err(|e| DatabaseError::query(format!("scan dataset table {}", table), e))?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::query(format!("read rows of {}", table), e))?
    {
        let mut values: BTreeMap<String, Value> = BTreeMap::new();
        for idx in 0..row.column_count() {
            let Some(column) = row.column_name(idx).map(str::to_string) else {
                continue;
            };
            let value = row
                .get_value(idx)
                .map_err(|e| DatabaseError::invalid_row(table, e.to_string()))?;
            values.insert(column, to_json(value));
        }

        let Some(id) = values.remove(&columns.id).as_ref().and_then(as_text) else {
            skipped += 1;
            continue;
        };
        let name = values
            .remove(&columns.name)
            .as_ref()
            .and_then(as_text)
            .unwrap_or_else(|| id.clone());
        let rank = values
            .remove(&columns.rank)
            .as_ref()
            .and_then(as_rank)
            .unwrap_or(rank::UNRANKED);
        let parent = values.remove(&columns.parent).as_ref().and_then(as_text);

        let mut record = Record::new(id, name, rank, parent);
        record.fields = values
            .into_iter()
            .filter(|(column, v)| !v.is_null() && column != RAW_JSON_COLUMN)
            .collect();
        records.push(record);
    }

    if skipped > 0 {
        warn!(
            "Skipped {} rows without '{}' in dataset table {}",
            skipped, columns.id, table
        );
    }
    info!("Loaded {} records from dataset table {}", records.len(), table);

    Ok(records)
}

/// Load `table` straight into an in-memory store
pub async fn load_store(
    db: &DatabaseService,
    table: &str,
    columns: &DatasetColumns,
) -> Result<InMemoryRecordStore, DatabaseError> {
    Ok(InMemoryRecordStore::new(load_records(db, table, columns).await?))
}
