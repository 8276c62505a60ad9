//! Record Endpoints
//!
//! Read-only access to the loaded dataset.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Health check endpoint
//! - `GET /api/records` - Filtered, ordered, paginated scan
//! - `GET /api/records/:id` - Get a record by id
//! - `GET /api/records/distinct/:field` - Distinct values of a field

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{AppState, HttpError};
use guildscope_core::db::{FieldFilter, ScanQuery};
use guildscope_core::models::Record;

pub const DEFAULT_SCAN_LIMIT: usize = 100;
pub const MAX_SCAN_LIMIT: usize = 1000;

/// Query keys consumed by the scan itself; every other key is an equality filter
const RESERVED_KEYS: [&str; 4] = ["orderBy", "desc", "limit", "offset"];

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub record_count: usize,
}

/// Page of scanned records
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<Arc<Record>>,
    pub limit: usize,
    pub offset: usize,
}

/// Health check endpoint
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/health
/// ```
async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        record_count: state.context.records().len(),
    })
}

/// Get a record by id
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/records/F1
/// ```
async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Arc<Record>>, HttpError> {
    state
        .context
        .records()
        .get_by_key(&id)
        .map(Json)
        .ok_or_else(|| HttpError::not_found(&id))
}

/// Build a scan from query parameters
///
/// `orderBy`, `desc`, `limit` and `offset` shape the scan; any other key is an
/// exact-match filter on that field.
fn scan_query(params: &HashMap<String, String>) -> Result<ScanQuery, HttpError> {
    let parse_usize = |key: &str| -> Result<Option<usize>, HttpError> {
        params
            .get(key)
            .map(|v| {
                v.parse::<usize>().map_err(|_| {
                    HttpError::invalid_input(format!("{} must be a non-negative integer", key))
                })
            })
            .transpose()
    };

    let limit = parse_usize("limit")?
        .unwrap_or(DEFAULT_SCAN_LIMIT)
        .min(MAX_SCAN_LIMIT);
    let offset = parse_usize("offset")?.unwrap_or(0);

    let mut filters: Vec<FieldFilter> = params
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| FieldFilter::equals(key.clone(), value.clone()))
        .collect();
    // Deterministic filter order for logging
    filters.sort_by(|a, b| a.field.cmp(&b.field));

    let mut query = ScanQuery::new().limit(limit).offset(offset);
    query.filters = filters;
    if let Some(field) = params.get("orderBy") {
        let descending = params
            .get("desc")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        query = query.order_by(field.clone(), descending);
    }
    Ok(query)
}

/// Scan records
///
/// # Query Parameters
///
/// - `orderBy` (optional): field to sort by
/// - `desc` (optional): `true` for descending order
/// - `limit` (optional): page size, default 100, capped at 1000
/// - `offset` (optional): records to skip
/// - any other key: exact-match filter on that field
///
/// # Example
///
/// ```bash
/// curl "http://localhost:3001/api/records?guild=Ectomycorrhizal&orderBy=name&limit=20"
/// ```
async fn scan_records(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<RecordPage>, HttpError> {
    let query = scan_query(&params)?;
    tracing::debug!("Scanning records with {:?}", query);

    let records = state.context.records().scan(&query);
    Ok(Json(RecordPage {
        records,
        limit: query.limit.unwrap_or(DEFAULT_SCAN_LIMIT),
        offset: query.offset,
    }))
}

/// Distinct non-null values of a field
///
/// # Example
///
/// ```bash
/// curl "http://localhost:3001/api/records/distinct/guild?trophicMode=Symbiotroph"
/// ```
async fn distinct_values(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<String>> {
    let filters: Vec<FieldFilter> = params
        .into_iter()
        .map(|(key, value)| FieldFilter::equals(key, value))
        .collect();
    Json(state.context.records().distinct_values(&field, &filters))
}

/// Create router with record endpoints
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/records", get(scan_records))
        .route("/api/records/distinct/:field", get(distinct_values))
        .route("/api/records/:id", get(get_record))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_scan_query_defaults_and_cap() {
        let query = scan_query(&params(&[])).unwrap();
        assert_eq!(query.limit, Some(DEFAULT_SCAN_LIMIT));
        assert_eq!(query.offset, 0);
        assert!(query.order_by.is_none());

        let query = scan_query(&params(&[("limit", "50000")])).unwrap();
        assert_eq!(query.limit, Some(MAX_SCAN_LIMIT));
    }

    #[test]
    fn test_scan_query_filters_and_order() {
        let query = scan_query(&params(&[
            ("guild", "Saprotroph"),
            ("orderBy", "name"),
            ("desc", "true"),
            ("offset", "10"),
        ]))
        .unwrap();
        assert_eq!(query.filters, vec![FieldFilter::equals("guild", "Saprotroph")]);
        let order = query.order_by.unwrap();
        assert_eq!(order.field, "name");
        assert!(order.descending);
        assert_eq!(query.offset, 10);
    }

    #[test]
    fn test_scan_query_rejects_bad_numbers() {
        let err = scan_query(&params(&[("limit", "-1")])).unwrap_err();
        assert_eq!(err.code, "INVALID_INPUT");
    }
}
