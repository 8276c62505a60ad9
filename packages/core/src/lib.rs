//! GuildScope Core
//!
//! Data management and business logic for the GuildScope taxonomy explorer: a
//! read-only ecological-trait dataset (FUNGuild / NEMAGuild) browsed as a
//! taxonomic tree, with curator edits stored as hierarchy overrides.
//!
//! # Architecture
//!
//! - **Read-only dataset**: records are loaded once per session and never written
//! - **Overrides on top**: a separate store of `child -> parent` edges replaces a
//!   record's embedded parent; the effective hierarchy is computed, not stored
//! - **Validation before persistence**: illegal moves (self-parent, rank
//!   inversion, cycles) are rejected before anything reaches the override store
//! - **libsql**: embedded SQLite for overrides, comments, accounts and the
//!   ingested dataset table
//!
//! # Modules
//!
//! - [`models`] - Data structures (Record, HierarchyOverride, Comment, Account)
//! - [`db`] - Stores: dataset, overrides, comments, accounts
//! - [`services`] - Resolver, validator, pane cache, editor, comments, session context
//! - [`ingest`] - FUNGuild / NEMAGuild payload ingestion and the Catalogue of Life tree walk

pub mod db;
pub mod ingest;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
