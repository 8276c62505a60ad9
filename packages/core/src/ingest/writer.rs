//! SQLite dataset writer
//!
//! Creates the dataset table on first use and upserts normalized records into
//! it inside a single transaction. The primary key depends on the profile
//! (`taxon` for NEMAGuild, `guid` otherwise). For taxon-keyed tables the
//! incoming row is merged with the stored one instead of overwriting it.
//!
//! Tables written before `parentGuid` existed gain the column on first use.

use crate::db::{is_valid_table_name, DatabaseError, DatabaseService};
use crate::ingest::merge::merge_duplicate_records;
use crate::ingest::normalize::NormalizedRecord;
use crate::ingest::{IngestError, IngestProfile};
use chrono::{DateTime, Utc};
use libsql::Value;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Upper bound on bound parameters per `IN (...)` lookup
const LOOKUP_CHUNK_SIZE: usize = 900;

/// Table columns in insert order
const COLUMNS: [&str; 14] = [
    "guid",
    "taxon",
    "mbNumber",
    "taxonomicLevel",
    "parentGuid",
    "trophicMode",
    "guild",
    "confidenceRanking",
    "growthForm",
    "trait",
    "notes",
    "citationSource",
    "raw_json",
    "ingested_at",
];

/// Outcome of one upsert batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Existing rows whose citation list grew (taxon-keyed tables only)
    pub citations_merged: usize,
}

fn check_table(table: &str) -> Result<(), IngestError> {
    if is_valid_table_name(table) {
        Ok(())
    } else {
        Err(IngestError::Database(DatabaseError::InvalidTableName(
            table.to_string(),
        )))
    }
}

fn sql_error(action: &str, e: libsql::Error) -> IngestError {
    IngestError::Database(DatabaseError::query(action, e))
}

/// Create `table` and its lookup indexes if missing
pub async fn init_table(
    conn: &libsql::Connection,
    table: &str,
    profile: IngestProfile,
) -> Result<(), IngestError> {
    check_table(table)?;
    let key = profile.key_column();

    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|&column| {
            let ty = if column == "taxonomicLevel" { "INTEGER" } else { "TEXT" };
            if column == key {
                format!("{} {} PRIMARY KEY", column, ty)
            } else {
                format!("{} {}", column, ty)
            }
        })
        .collect();

    conn.execute(
        &format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns.join(", ")),
        (),
    )
    .await
    .map_err(|e| sql_error(&format!("create table {}", table), e))?;

    add_missing_columns(conn, table).await?;

    for column in profile.indexed_columns() {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})",
                table = table,
                column = column
            ),
            (),
        )
        .await
        .map_err(|e| sql_error(&format!("index {}.{}", table, column), e))?;
    }
    Ok(())
}

/// Add any of [`COLUMNS`] an older `table` lacks
async fn add_missing_columns(conn: &libsql::Connection, table: &str) -> Result<(), IngestError> {
    let mut rows = conn
        .query(&format!("PRAGMA table_info({})", table), ())
        .await
        .map_err(|e| sql_error(&format!("inspect table {}", table), e))?;
    let mut present = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| sql_error(&format!("inspect table {}", table), e))?
    {
        let name = row.get::<String>(1).map_err(|e| {
            IngestError::Database(DatabaseError::invalid_row(table, e.to_string()))
        })?;
        present.push(name);
    }

    for column in COLUMNS.iter().filter(|c| !present.iter().any(|p| p.as_str() == **c)) {
        info!("Adding column {} to {}", column, table);
        conn.execute(&format!("ALTER TABLE {} ADD COLUMN {} TEXT", table, column), ())
            .await
            .map_err(|e| sql_error(&format!("add column {}.{}", table, column), e))?;
    }
    Ok(())
}

fn text(value: &Option<String>) -> Value {
    value.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn row_values(record: &NormalizedRecord) -> Vec<Value> {
    vec![
        text(&record.guid),
        text(&record.taxon),
        text(&record.mb_number),
        record.taxonomic_level.map(Value::Integer).unwrap_or(Value::Null),
        text(&record.parent_guid),
        text(&record.trophic_mode),
        text(&record.guild),
        text(&record.confidence_ranking),
        text(&record.growth_form),
        text(&record.trait_name),
        text(&record.notes),
        text(&record.citation_source),
        Value::Text(record.raw_json.clone()),
        Value::Text(record.ingested_at.to_rfc3339()),
    ]
}

fn row_to_record(row: &libsql::Row) -> Result<NormalizedRecord, IngestError> {
    let get = |idx: i32| -> Result<Option<String>, IngestError> {
        row.get::<Option<String>>(idx)
            .map_err(|e| IngestError::Database(DatabaseError::invalid_row("dataset", e.to_string())))
    };
    let level = row
        .get::<Option<i64>>(3)
        .map_err(|e| IngestError::Database(DatabaseError::invalid_row("dataset", e.to_string())))?;
    let ingested_at = get(13)?
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    Ok(NormalizedRecord {
        guid: get(0)?,
        taxon: get(1)?,
        mb_number: get(2)?,
        taxonomic_level: level,
        parent_guid: get(4)?,
        trophic_mode: get(5)?,
        guild: get(6)?,
        confidence_ranking: get(7)?,
        growth_form: get(8)?,
        trait_name: get(9)?,
        notes: get(10)?,
        citation_source: get(11)?,
        raw_json: get(12)?.unwrap_or_default(),
        ingested_at,
    })
}

/// Stored rows for the given keys, keyed by the profile's key column
async fn existing_rows(
    conn: &libsql::Connection,
    table: &str,
    profile: IngestProfile,
    keys: &[String],
) -> Result<HashMap<String, NormalizedRecord>, IngestError> {
    let key_column = profile.key_column();
    let mut existing = HashMap::new();

    for chunk in keys.chunks(LOOKUP_CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(",");
        let params: Vec<Value> = chunk.iter().cloned().map(Value::Text).collect();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM {} WHERE {} IN ({})",
                    COLUMNS.join(", "),
                    table,
                    key_column,
                    placeholders
                ),
                params,
            )
            .await
            .map_err(|e| sql_error("look up existing rows", e))?;

        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| sql_error("read existing rows", e))?
        {
            let record = row_to_record(&row)?;
            if let Some(key) = record.key(profile).map(str::to_string) {
                existing.insert(key, record);
            }
        }
    }
    Ok(existing)
}

/// Upsert `records` into `table`, creating it if needed.
///
/// FUNGuild rows replace stored rows with the same guid. NEMAGuild rows are
/// merged with the stored row for their taxon first.
pub async fn upsert_many(
    db: &DatabaseService,
    table: &str,
    profile: IngestProfile,
    records: &[NormalizedRecord],
) -> Result<UpsertSummary, IngestError> {
    check_table(table)?;

    let conn = db.connect_with_timeout().await?;
    db.execute_pragma(&conn, "PRAGMA journal_mode = DELETE").await?;
    init_table(&conn, table, profile).await?;

    if records.is_empty() {
        return Ok(UpsertSummary::default());
    }

    let key_column = profile.key_column();
    let keys: Vec<String> = records
        .iter()
        .filter_map(|r| r.key(profile).map(str::to_string))
        .collect();
    let existing = existing_rows(&conn, table, profile, &keys).await?;

    let mut summary = UpsertSummary::default();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let Some(key) = record.key(profile) else {
            continue;
        };
        match existing.get(key) {
            Some(stored) => {
                summary.updated += 1;
                if profile.merges_duplicates() {
                    let merged = merge_duplicate_records(vec![stored.clone(), record.clone()])
                        .unwrap_or_else(|| record.clone());
                    if merged.citation_source != stored.citation_source {
                        info!("Merging citations for '{}'", key);
                        summary.citations_merged += 1;
                    }
                    rows.push(merged);
                } else {
                    rows.push(record.clone());
                }
            }
            None => {
                summary.inserted += 1;
                rows.push(record.clone());
            }
        }
    }

    let updates: Vec<String> = COLUMNS
        .iter()
        .filter(|&&column| column != key_column)
        .map(|column| format!("{column}=excluded.{column}", column = column))
        .collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        table,
        COLUMNS.join(", "),
        vec!["?"; COLUMNS.len()].join(", "),
        key_column,
        updates.join(", ")
    );

    let tx = conn
        .transaction()
        .await
        .map_err(|e| sql_error("begin transaction", e))?;
    for row in &rows {
        tx.execute(&sql, row_values(row))
            .await
            .map_err(|e| sql_error(&format!("upsert into {}", table), e))?;
    }
    tx.commit()
        .await
        .map_err(|e| sql_error("commit ingestion", e))?;

    debug!(
        "Upserted {} rows into {} ({} inserted, {} updated)",
        rows.len(),
        table,
        summary.inserted,
        summary.updated
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize::normalize_at;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    async fn count(db: &DatabaseService, table: &str) -> i64 {
        let conn = db.connect_with_timeout().await.unwrap();
        let mut rows = conn
            .query(&format!("SELECT COUNT(*) FROM {}", table), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    #[tokio::test]
    async fn test_funguild_upsert_counts() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::open(temp_dir.path().join("funguild.sqlite"))
            .await
            .unwrap();
        let now = Utc::now();
        let first: Vec<_> = [json!({"guid": "G1", "taxon": "Amanita"}), json!({"guid": "G2"})]
            .iter()
            .filter_map(|raw| normalize_at(raw, IngestProfile::Funguild, now))
            .collect();

        let summary = upsert_many(&db, "funguild", IngestProfile::Funguild, &first)
            .await
            .unwrap();
        assert_eq!((summary.inserted, summary.updated), (2, 0));

        let second: Vec<_> = [json!({"guid": "G1", "taxon": "Amanita L."}), json!({"guid": "G3"})]
            .iter()
            .filter_map(|raw| normalize_at(raw, IngestProfile::Funguild, now))
            .collect();
        let summary = upsert_many(&db, "funguild", IngestProfile::Funguild, &second)
            .await
            .unwrap();
        assert_eq!((summary.inserted, summary.updated), (1, 1));
        assert_eq!(count(&db, "funguild").await, 3);
    }

    #[tokio::test]
    async fn test_nemaguild_merges_with_stored_row() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::open(temp_dir.path().join("nema.sqlite"))
            .await
            .unwrap();
        let now = Utc::now();

        let stored = normalize_at(
            &json!({"taxon": "Mononchus", "guild": "Predator", "citationSource": "Yeates 1993"}),
            IngestProfile::Nemaguild,
            now - Duration::days(1),
        )
        .unwrap();
        upsert_many(&db, "nemaguild", IngestProfile::Nemaguild, &[stored])
            .await
            .unwrap();

        let incoming = normalize_at(
            &json!({"taxon": "Mononchus", "citationSource": "Bongers 1990"}),
            IngestProfile::Nemaguild,
            now,
        )
        .unwrap();
        let summary = upsert_many(&db, "nemaguild", IngestProfile::Nemaguild, &[incoming])
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.citations_merged, 1);

        let conn = db.connect_with_timeout().await.unwrap();
        let mut rows = conn
            .query("SELECT guild, citationSource FROM nemaguild WHERE taxon = 'Mononchus'", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "Predator");
        assert_eq!(row.get::<String>(1).unwrap(), "Bongers 1990 || Yeates 1993");
    }

    #[tokio::test]
    async fn test_parent_guid_is_stored() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::open(temp_dir.path().join("col.sqlite"))
            .await
            .unwrap();
        let records: Vec<_> = [
            json!({"guid": "62ZF", "taxon": "Amanita", "taxonomicLevel": 13}),
            json!({"guid": "6MJ4K", "taxon": "Amanita muscaria", "taxonomicLevel": 20, "parentGuid": "62ZF"}),
        ]
        .iter()
        .filter_map(|raw| normalize_at(raw, IngestProfile::CatalogueOfLife, Utc::now()))
        .collect();
        upsert_many(&db, "catalogueoflife", IngestProfile::CatalogueOfLife, &records)
            .await
            .unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        let mut rows = conn
            .query("SELECT parentGuid FROM catalogueoflife WHERE guid = '6MJ4K'", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "62ZF");
    }

    #[tokio::test]
    async fn test_older_table_gains_parent_column() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::open(temp_dir.path().join("funguild.sqlite"))
            .await
            .unwrap();
        let conn = db.connect_with_timeout().await.unwrap();
        let legacy: Vec<&str> = COLUMNS.iter().copied().filter(|c| *c != "parentGuid").collect();
        conn.execute(
            &format!(
                "CREATE TABLE funguild ({} PRIMARY KEY, {})",
                legacy[0],
                legacy[1..].join(", ")
            ),
            (),
        )
        .await
        .unwrap();

        let record = normalize_at(
            &json!({"guid": "S1", "taxon": "Amanita muscaria", "parentGuid": "G1"}),
            IngestProfile::Funguild,
            Utc::now(),
        )
        .unwrap();
        let summary = upsert_many(&db, "funguild", IngestProfile::Funguild, &[record])
            .await
            .unwrap();
        assert_eq!(summary.inserted, 1);

        let mut rows = conn
            .query("SELECT parentGuid FROM funguild WHERE guid = 'S1'", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "G1");
    }

    #[tokio::test]
    async fn test_invalid_table_name_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::open(temp_dir.path().join("x.sqlite"))
            .await
            .unwrap();
        let err = upsert_many(&db, "bad-name", IngestProfile::Funguild, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Database(DatabaseError::InvalidTableName(_))
        ));
    }
}
