//! Whole-collection change detection.
//!
//! A snapshot is the canonical serialization of one fetched event list.
//! Byte equality of two snapshots is the sole change signal; no per-event
//! diff is ever computed.

use crate::portal::RawEvent;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    /// The canonical form of "no events", which absent or corrupt stored
    /// state degrades to.
    pub fn empty() -> Self {
        Self("[]".to_string())
    }

    /// Canonicalizes a fetched event list.
    ///
    /// Serializing the parsed events (rather than keeping the raw response
    /// body) makes the form insensitive to whitespace or field-order noise
    /// in the portal response.
    pub fn canonicalize(events: &[RawEvent]) -> Self {
        // string-only structs cannot fail to serialize
        Self(serde_json::to_string(events).unwrap())
    }

    /// Revives a previously stored snapshot. Anything unreadable counts as
    /// empty, never as an error.
    pub fn from_stored(stored: Option<&str>) -> Self {
        match stored {
            Some(body) => {
                if serde_json::from_str::<Vec<RawEvent>>(body).is_ok() {
                    Self(body.to_string())
                } else {
                    warn!("stored snapshot is corrupt, treating as empty");
                    Self::empty()
                }
            }
            None => Self::empty(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
