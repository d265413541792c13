//! Authenticated user record and the client-side admin allowlist.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// User record returned by the auth endpoints and cached next to the token.
///
/// `email` is kept as the backend sent it rather than as an
/// [`Email`](super::Email): cached records are display data and are never
/// re-validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_admin: bool,
}

/// Comma-separated list of emails treated as administrators by the client.
///
/// This only decides what the client offers to show. It is not an
/// authorization check; the backend must enforce access to admin endpoints
/// on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowlist {
    emails: Vec<String>,
}

impl AdminAllowlist {
    /// Parse a comma-separated list. Entries are trimmed and lower-cased;
    /// blank entries are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let emails = raw
            .split(',')
            .map(|entry| entry.trim().to_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect();
        Self { emails }
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Whether `email` is on the list (case-insensitive).
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        let wanted = email.trim().to_lowercase();
        self.emails.iter().any(|e| *e == wanted)
    }

    /// A user is an admin if the backend flagged them or their email is
    /// on the list.
    #[must_use]
    pub fn is_admin(&self, user: &User) -> bool {
        user.is_admin || (!user.email.is_empty() && self.contains(&user.email))
    }
}
