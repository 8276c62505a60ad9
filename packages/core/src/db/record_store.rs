//! Record Store - Read-only keyed lookup and filtered scans
//!
//! The dataset is loaded once per session and never written to, so every read
//! here is a synchronous in-memory operation. [`RecordStore`] is the seam the
//! hierarchy and editor services depend on; [`RecordFetcher`] is the async
//! seam the pane cache fetches through (a remote fetcher can implement it
//! without implementing the whole store).
//!
//! # Examples
//!
//! ```rust
//! use guildscope_core::db::{FieldFilter, InMemoryRecordStore, RecordStore, ScanQuery};
//! use guildscope_core::models::{rank, Record};
//!
//! let store = InMemoryRecordStore::new(vec![
//!     Record::new("G1", "Amanita", rank::GENUS, None).with_field("guild", "Ectomycorrhizal"),
//!     Record::new("G2", "Boletus", rank::GENUS, None).with_field("guild", "Ectomycorrhizal"),
//! ]);
//!
//! let query = ScanQuery::new().filter(FieldFilter::equals("guild", "Ectomycorrhizal"));
//! assert_eq!(store.scan(&query).len(), 2);
//! assert!(store.get_by_key("G1").is_some());
//! ```

use crate::models::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

/// How a filter compares a record field against its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    /// Case-sensitive equality
    Equals,
    /// Case-insensitive substring match
    Contains,
    /// Case-insensitive prefix match
    StartsWith,
}

/// One `field <op> value` constraint of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equals,
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Contains,
            value: value.into(),
        }
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::StartsWith,
            value: value.into(),
        }
    }

    /// Whether `record` satisfies this filter. Missing fields never match.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.field(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Equals => actual == self.value.as_str(),
            FilterOp::Contains => actual
                .to_lowercase()
                .contains(&self.value.to_lowercase()),
            FilterOp::StartsWith => actual
                .to_lowercase()
                .starts_with(&self.value.to_lowercase()),
        }
    }
}

/// Sort specification for a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// Filtered, ordered, paginated scan over the dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanQuery {
    #[serde(default)]
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ScanQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }
}

/// Read-only access to the loaded dataset
pub trait RecordStore: Send + Sync {
    /// Look up a record by id
    fn get_by_key(&self, id: &str) -> Option<Arc<Record>>;

    /// Records matching every filter, ordered, then paginated
    fn scan(&self, query: &ScanQuery) -> Vec<Arc<Record>>;

    /// Sorted distinct non-null values of `field` over records matching `filters`
    fn distinct_values(&self, field: &str, filters: &[FieldFilter]) -> Vec<String>;

    /// Every record, in load order
    fn records(&self) -> Vec<Arc<Record>>;

    /// Number of loaded records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Async record lookup used by the pane cache.
///
/// `Ok(None)` means the id does not exist (permanent); `Err` is a transport
/// or storage failure the caller may retry.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch(&self, id: &str) -> anyhow::Result<Option<Arc<Record>>>;
}

/// In-memory dataset keyed by record id
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Vec<Arc<Record>>,
    index: HashMap<String, usize>,
}

impl InMemoryRecordStore {
    /// Build a store from loaded records.
    ///
    /// Ids are unique keys: when the same id appears twice the later record
    /// wins and a warning is logged.
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::default();
        for record in records {
            if let Some(&slot) = store.index.get(&record.id) {
                warn!("Duplicate record id '{}' in dataset, keeping the later row", record.id);
                store.records[slot] = Arc::new(record);
            } else {
                store.index.insert(record.id.clone(), store.records.len());
                store.records.push(Arc::new(record));
            }
        }
        store
    }
}

/// Sort key of one field value: finite numbers, then text, then missing.
///
/// Strings that parse to NaN or infinity sort as text so every pair of
/// values stays comparable.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
    Missing,
}

impl SortKey {
    fn of(value: Option<&str>) -> Self {
        match value {
            None => Self::Missing,
            Some(text) => match text.trim().parse::<f64>() {
                Ok(number) if number.is_finite() => Self::Number(number),
                _ => Self::Text(text.to_lowercase()),
            },
        }
    }

    fn class(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Missing => 2,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.class().cmp(&other.class()),
        }
    }
}

/// Total order over optional field values: numbers numerically, text
/// case-insensitively, missing values last
fn compare_field(a: Option<&str>, b: Option<&str>) -> Ordering {
    SortKey::of(a).compare(&SortKey::of(b))
}

impl RecordStore for InMemoryRecordStore {
    fn get_by_key(&self, id: &str) -> Option<Arc<Record>> {
        self.index.get(id).map(|&slot| self.records[slot].clone())
    }

    fn scan(&self, query: &ScanQuery) -> Vec<Arc<Record>> {
        let mut matched: Vec<Arc<Record>> = self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        if let Some(order) = &query.order_by {
            matched.sort_by(|a, b| {
                let ordering = compare_field(
                    a.field(&order.field).as_deref(),
                    b.field(&order.field).as_deref(),
                )
                .then_with(|| a.id.cmp(&b.id));
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let page = matched.into_iter().skip(query.offset);
        match query.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        }
    }

    fn distinct_values(&self, field: &str, filters: &[FieldFilter]) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .filter_map(|r| r.field(field).map(|v| v.into_owned()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn records(&self) -> Vec<Arc<Record>> {
        self.records.clone()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl RecordFetcher for InMemoryRecordStore {
    async fn fetch(&self, id: &str) -> anyhow::Result<Option<Arc<Record>>> {
        Ok(self.get_by_key(id))
    }
}
