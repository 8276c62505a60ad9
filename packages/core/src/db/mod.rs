//! Database Layer
//!
//! This module holds every store GuildScope talks to:
//!
//! - `RecordStore` / `RecordFetcher` - the read-only dataset, loaded once per
//!   session into memory (optionally from a SQLite dataset table)
//! - `OverrideStore` - persisted hierarchy overrides (upsert, last write wins)
//! - `CommentStore` - append-only comment threads
//! - `AccountStore` - registration, approval and token lookup
//!
//! Persistent implementations use libsql (embedded SQLite) through
//! [`DatabaseService`]; in-memory implementations back tests and offline use.

mod account_store;
mod comment_store;
pub mod dataset;
mod database;
mod error;
pub mod events;
mod override_store;
mod record_store;

pub use account_store::{AccountStore, SqliteAccountStore};
pub use comment_store::{CommentStore, InMemoryCommentStore, SqliteCommentStore};
pub use database::DatabaseService;
pub use dataset::{is_valid_table_name, DatasetColumns};
pub use error::DatabaseError;
pub use events::DomainEvent;
pub use override_store::{InMemoryOverrideStore, OverrideStore, SqliteOverrideStore};
pub use record_store::{
    FieldFilter, FilterOp, InMemoryRecordStore, OrderBy, RecordFetcher, RecordStore, ScanQuery,
};
