//! Database Connection Management
//!
//! This module provides the libsql connection handling used by every
//! persistent store in GuildScope.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Application schema**: `hierarchy_overrides`, `comments` and `accounts`
//!   tables, created idempotently by [`DatabaseService::new`]
//! - **Dataset files**: opened without touching their schema through
//!   [`DatabaseService::open`]
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** The 5-second
//! busy timeout lets concurrent writers wait instead of failing immediately
//! with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use guildscope_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/guildscope.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Database service for managing the libsql connection and schema
#[derive(Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl DatabaseService {
    /// Open (or create) the application database and initialize its schema
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Create the override, comment and account tables if missing
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        let service = Self::open(db_path).await?;
        service.initialize_schema().await?;
        Ok(service)
    }

    /// Open a database file without initializing the application schema
    ///
    /// Used for dataset files produced by the ingestion pipeline.
    pub async fn open(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::data_directory(db_path.clone(), e))?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::open(db_path.clone(), e))?;

        debug!("Opened database at {}", db_path.display());

        Ok(Self {
            db: Arc::new(db),
            db_path,
        })
    }

    /// Get a raw connection
    ///
    /// Prefer [`connect_with_timeout`](Self::connect_with_timeout) in async code.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db
            .connect()
            .map_err(|e| DatabaseError::open(self.db_path.clone(), e))
    }

    /// Get a connection with a 5 second busy timeout
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        Ok(conn)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    pub async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn
            .prepare(pragma)
            .await
            .map_err(|e| DatabaseError::query(format!("execute '{}'", pragma), e))?;
        let _ = stmt
            .query(())
            .await
            .map_err(|e| DatabaseError::query(format!("execute '{}'", pragma), e))?;
        Ok(())
    }

    /// Create the application tables and indexes (idempotent)
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        // One row per child: upserts replace the previous edge
        conn.execute(
            "CREATE TABLE IF NOT EXISTS hierarchy_overrides (
                child_id TEXT PRIMARY KEY,
                parent_id TEXT,
                updated_by TEXT,
                updated_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| DatabaseError::schema("hierarchy_overrides table", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                record_id TEXT NOT NULL,
                author TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| DatabaseError::schema("comments table", e))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_comments_record ON comments(record_id, created_at)",
            (),
        )
        .await
        .map_err(|e| DatabaseError::schema("comments index", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                username TEXT PRIMARY KEY,
                token TEXT NOT NULL UNIQUE,
                approved INTEGER NOT NULL DEFAULT 0,
                can_edit INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| DatabaseError::schema("accounts table", e))?;

        Ok(())
    }
}
