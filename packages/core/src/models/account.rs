//! Accounts and Capabilities
//!
//! Accounts are registered unapproved and become usable once an administrator
//! approves them. The hierarchy and comment services never look at accounts
//! directly; they consult a [`Capability`], an opaque "who is this and may they
//! edit" gate derived from the account behind a request or session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    /// Bearer token issued at registration
    pub token: String,
    pub approved: bool,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A freshly registered, unapproved account
    pub fn register(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: Uuid::new_v4().to_string(),
            approved: false,
            can_edit: false,
            created_at: Utc::now(),
        }
    }
}

/// What the current caller is allowed to do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// Authenticated username, if any
    pub user: Option<String>,
    pub can_edit: bool,
}

impl Capability {
    /// Unauthenticated visitor: may browse, may not comment or edit
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated user without edit rights
    pub fn reader(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            can_edit: false,
        }
    }

    /// Authenticated user with edit rights
    pub fn editor(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            can_edit: true,
        }
    }

    /// Derive the capability for an (optional) account.
    ///
    /// Unapproved accounts are treated as anonymous.
    pub fn from_account(account: Option<&Account>) -> Self {
        match account {
            Some(account) if account.approved => Self {
                user: Some(account.username.clone()),
                can_edit: account.can_edit,
            },
            _ => Self::anonymous(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unapproved_account_is_anonymous() {
        let mut account = Account::register("mycologist");
        account.can_edit = true;
        assert_eq!(Capability::from_account(Some(&account)), Capability::anonymous());
    }

    #[test]
    fn test_approved_account_capabilities() {
        let mut account = Account::register("mycologist");
        account.approved = true;
        assert_eq!(
            Capability::from_account(Some(&account)),
            Capability::reader("mycologist")
        );

        account.can_edit = true;
        let capability = Capability::from_account(Some(&account));
        assert!(capability.can_edit);
        assert!(capability.is_authenticated());
    }

    #[test]
    fn test_registration_issues_distinct_tokens() {
        let a = Account::register("a");
        let b = Account::register("b");
        assert_ne!(a.token, b.token);
        assert!(!a.approved);
    }
}
