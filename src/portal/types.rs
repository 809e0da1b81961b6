//! Wire types for the portal's JSON endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped timetable entry, exactly as the room/schedule endpoint
/// delivers it. Start/end are portal-local wall-clock strings in the
/// fixed `yyyy-MM-dd HH:mm` format.
///
/// The portal assigns no per-event identity; change detection works on the
/// serialized event list as a whole (see [`crate::sync::Snapshot`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub title: String,
    pub instructor: String,
    /// Secondary instructor; often empty or a duplicate of `instructor`.
    pub sinstructor: String,
    pub room: String,
    /// Secondary room; often empty or a duplicate of `room`.
    pub sroom: String,
    pub description: String,
    pub remarks: String,
    pub start: String,
    pub end: String,
}

/// The dashboard timeline feed, used only for term-start discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineFeed {
    pub events: Vec<TimelineEvent>,
}

/// One labeled block from the timeline feed. Dates come in an English
/// RFC 1123-style format (`EEE, dd MMM yyyy HH:mm:ss Z`).
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEvent {
    pub title: String,
    pub start: String,
    pub end: String,
}

/// Six months approximated as 31-day months, matching the window the
/// original portal frontend requests.
const SEMESTER_WINDOW_SECS: i64 = 60 * 60 * 24 * 31 * 6;

/// Fetch window for the schedule endpoint, as epoch-second bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: i64,
    pub end: i64,
}

impl EventWindow {
    /// Default window: term start through six 31-day months later.
    ///
    /// An unknown term start falls back to the Unix epoch. That window is
    /// degenerate but stable: it produces the same result on every run, so
    /// it never causes rebuild flapping.
    pub fn from_term_start(term_start: Option<DateTime<Utc>>) -> Self {
        let start = term_start.map(|t| t.timestamp()).unwrap_or(0);
        Self {
            start,
            end: start + SEMESTER_WINDOW_SECS,
        }
    }
}
