//! Data Models
//!
//! This module contains the core data structures used throughout GuildScope:
//!
//! - `Record` - Read-only dataset entity (taxon with rank and embedded parent)
//! - `HierarchyOverride` - Persisted edge replacing a record's embedded parent
//! - `Comment` - Append-only annotation on a record
//! - `Account` / `Capability` - Registered users and the edit gate derived from them

mod account;
mod comment;
mod hierarchy_override;
mod record;

pub use account::{Account, Capability};
pub use comment::Comment;
pub use hierarchy_override::{HierarchyOverride, StoredOverride};
pub use record::{rank, Record, SYNTHETIC_ROOT_ID};
