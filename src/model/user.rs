//! Forum user identities.

use chrono::{DateTime, Utc};

/// A forum user, keyed by email.
///
/// Created lazily the first time an address shows up in an import. The join
/// and last-seen dates default to that first message's date so imported
/// history orders correctly.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserIdentity {
    /// Lower-cased address; unique across the store.
    pub email: String,
    /// Display name as first seen.
    pub name: String,
    pub date_joined: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    /// Cumulative post score.
    pub score: i64,
}

impl UserIdentity {
    /// A fresh identity first seen at `seen`.
    pub fn new(email: impl Into<String>, name: impl Into<String>, seen: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            date_joined: seen,
            last_login: seen,
            score: 0,
        }
    }
}
