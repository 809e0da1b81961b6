//! Wire shapes for the Calendar v3 API and batch-upload reporting.

use serde::{Deserialize, Serialize};

/// Body of a Calendar v3 `events.insert` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    /// Fixed tag marking portal-sourced events so they are visually
    /// distinguishable in the calendar UI.
    #[serde(rename = "colorId")]
    pub color_id: String,
}

/// Timezone-qualified point in time, as the Calendar API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDateTime {
    /// RFC 3339 date-time.
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone")]
    pub time_zone: String,
}

/// Outcome of one `insert_events` call across all batches.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Events handed to the batch endpoint.
    pub attempted: usize,
    /// Events the API acknowledged with a 2xx part status.
    pub inserted: usize,
    /// Per-item failures; uploads continue past them.
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.attempted += other.attempted;
        self.inserted += other.inserted;
        self.failures.extend(other.failures);
    }
}

/// One failed part of a batch upload.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Index of the event in the overall upload order.
    pub index: usize,
    /// HTTP status of the failed part.
    pub status: u16,
    /// Summary of the affected event, for the log line.
    pub summary: String,
}
