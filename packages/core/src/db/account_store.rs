//! Account Store - registration, approval and token lookup
//!
//! Registration creates an unapproved account with a fresh bearer token.
//! An administrator approves accounts, optionally granting edit rights.

use crate::db::error::DatabaseError;
use crate::db::DatabaseService;
use crate::models::Account;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Register a new, unapproved account. Fails if the username is taken.
    async fn register(&self, username: &str) -> Result<Account>;

    /// Approve an account. Returns `None` when the username is unknown.
    async fn approve(&self, username: &str, can_edit: bool) -> Result<Option<Account>>;

    /// Account registered under `username`, if any
    async fn find(&self, username: &str) -> Result<Option<Account>>;

    /// Account owning `token`, if any
    async fn resolve_token(&self, token: &str) -> Result<Option<Account>>;

    /// Accounts awaiting approval, oldest first
    async fn list_pending(&self) -> Result<Vec<Account>>;
}

/// libsql-backed account store (`accounts` table)
pub struct SqliteAccountStore {
    db: DatabaseService,
}

const ACCOUNT_COLUMNS: &str = "username, token, approved, can_edit, created_at";

impl SqliteAccountStore {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    fn row_to_account(row: &libsql::Row) -> Result<Account> {
        let username: String = row.get(0).context("Failed to get username")?;
        let token: String = row.get(1).context("Failed to get token")?;
        let approved: i64 = row.get(2).context("Failed to get approved")?;
        let can_edit: i64 = row.get(3).context("Failed to get can_edit")?;
        let created_at: String = row.get(4).context("Failed to get created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .with_context(|| format!("Unable to parse timestamp '{}'", created_at))?
            .with_timezone(&Utc);

        Ok(Account {
            username,
            token,
            approved: approved != 0,
            can_edit: can_edit != 0,
            created_at,
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Account>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM accounts WHERE {} = ?",
                ACCOUNT_COLUMNS, column
            ))
            .await
            .map_err(|e| DatabaseError::query("prepare account query", e))?;
        let mut rows = stmt
            .query([value])
            .await
            .map_err(|e| DatabaseError::query("query account", e))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::query("read account rows", e))?
        {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn register(&self, username: &str) -> Result<Account> {
        let account = Account::register(username);
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO accounts (username, token, approved, can_edit, created_at) VALUES (?, ?, 0, 0, ?)",
            (
                account.username.as_str(),
                account.token.as_str(),
                account.created_at.to_rfc3339(),
            ),
        )
        .await
        .map_err(|e| {
            DatabaseError::query(format!("register account '{}'", username), e)
        })?;

        info!("Registered account '{}' (pending approval)", username);
        Ok(account)
    }

    async fn approve(&self, username: &str, can_edit: bool) -> Result<Option<Account>> {
        let conn = self.db.connect_with_timeout().await?;
        let changed = conn
            .execute(
                "UPDATE accounts SET approved = 1, can_edit = ? WHERE username = ?",
                (can_edit as i64, username),
            )
            .await
            .map_err(|e| DatabaseError::query("approve account", e))?;

        if changed == 0 {
            return Ok(None);
        }
        info!("Approved account '{}' (can_edit = {})", username, can_edit);
        self.find_one("username", username).await
    }

    async fn find(&self, username: &str) -> Result<Option<Account>> {
        self.find_one("username", username).await
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<Account>> {
        self.find_one("token", token).await
    }

    async fn list_pending(&self) -> Result<Vec<Account>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM accounts WHERE approved = 0 ORDER BY created_at ASC",
                    ACCOUNT_COLUMNS
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::query("list pending accounts", e))?;

        let mut accounts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::query("read account rows", e))?
        {
            accounts.push(Self::row_to_account(&row)?);
        }
        Ok(accounts)
    }
}
