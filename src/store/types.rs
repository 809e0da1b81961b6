use serde::{Deserialize, Serialize};

/// Stored portal login state: username plus the 32-character session hash.
///
/// Owned by the store; the sync cycle only reads these, and only an
/// explicit login refreshes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub username: String,
    pub session_hash: String,
}

/// A stored event snapshot with its fetch time.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    /// Canonical serialization of the event list.
    pub body: String,
    /// SQLite `datetime('now')` of the fetch that produced it.
    pub fetched_at: String,
}
