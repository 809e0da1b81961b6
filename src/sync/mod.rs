//! One synchronization cycle.
//!
//! The cycle is idempotent: an unchanged portal snapshot leaves the
//! destination calendar alone, and a changed one fully replaces it
//! (delete, recreate, repopulate). Nothing is ever merged.

mod snapshot;

pub use snapshot::Snapshot;

use crate::calendar::{convert_event, parse_portal_datetime, CalendarApi, CalendarError, DateFormatError};
use crate::config::{CalendarConfig, PortalConfig};
use crate::portal::{EventWindow, PortalError, PortalSession, RawEvent};
use crate::store::{StoreError, SyncStore};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Worker invocation result. There is no permanent-failure state: every
/// failed cycle is retryable on the external scheduler's backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    Retry,
}

impl SyncOutcome {
    /// Process exit code for the scheduler: 0 on success, 1 on retry.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncOutcome::Success => 0,
            SyncOutcome::Retry => 1,
        }
    }
}

/// A recoverable failure inside one cycle. Caught at the [`SyncEngine::run`]
/// boundary and mapped to [`SyncOutcome::Retry`].
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no stored credentials; run `campusdual-sync login` first")]
    NoCredentials,
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    DateFormat(#[from] DateFormatError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates one sync cycle against the portal and the calendar service.
pub struct SyncEngine<C: CalendarApi> {
    store: Arc<SyncStore>,
    portal: PortalConfig,
    calendar: C,
    calendar_name: String,
    time_zone: String,
}

impl<C: CalendarApi> SyncEngine<C> {
    pub fn new(
        store: Arc<SyncStore>,
        portal: PortalConfig,
        calendar_config: &CalendarConfig,
        calendar: C,
    ) -> Self {
        Self {
            store,
            portal,
            calendar,
            calendar_name: calendar_config.calendar_name.clone(),
            time_zone: calendar_config.time_zone.clone(),
        }
    }

    /// Runs one cycle to completion. Never panics and never escalates: any
    /// recoverable failure becomes `Retry` for the scheduler's backoff.
    pub async fn run(&self) -> SyncOutcome {
        let started = Instant::now();
        match self.run_cycle().await {
            Ok(()) => {
                info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "sync cycle completed"
                );
                SyncOutcome::Success
            }
            Err(e) => {
                warn!(
                    error = %e,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "sync cycle failed, scheduler should retry"
                );
                SyncOutcome::Retry
            }
        }
    }

    async fn run_cycle(&self) -> Result<(), CycleError> {
        let credentials = self
            .read_or_absent(self.store.credentials(), "credentials")
            .ok_or(CycleError::NoCredentials)?;
        let session = PortalSession::resume(&self.portal, credentials)?;

        let stored_body = self
            .read_or_absent(self.store.snapshot(), "snapshot")
            .map(|s| s.body);
        let stored = Snapshot::from_stored(stored_body.as_deref());

        let term_start = session.fetch_term_start().await;
        let window = EventWindow::from_term_start(term_start);
        let events = session.fetch_events(&window).await?;
        let fresh = Snapshot::canonicalize(&events);
        // Persisted before any calendar work, so the next run compares
        // against the latest fetch even if this cycle dies later.
        self.store.put_snapshot(fresh.as_str())?;

        let calendar_id = match self.read_or_absent(self.store.calendar_id(), "calendar id") {
            Some(id) => id,
            None => self.create_and_persist_calendar().await?,
        };

        if fresh == stored {
            debug!("snapshot unchanged, calendar left as is");
            return Ok(());
        }

        let term_start = session.fetch_term_start().await;
        let converted = filter_and_convert(&events, term_start_millis(term_start))?;
        info!(
            fetched = events.len(),
            kept = converted.len(),
            "snapshot changed, rebuilding calendar"
        );

        self.calendar.delete_calendar(&calendar_id).await?;
        let new_id = self.create_and_persist_calendar().await?;

        let report = self.calendar.insert_events(&new_id, &converted).await?;
        // Lenient per-item policy: a failed insert is logged and skipped,
        // the cycle still counts as success.
        for failure in &report.failures {
            warn!(
                index = failure.index,
                status = failure.status,
                summary = %failure.summary,
                "event insert failed, continuing"
            );
        }
        Ok(())
    }

    /// Creates the destination calendar and persists its id before any
    /// events are uploaded to it.
    async fn create_and_persist_calendar(&self) -> Result<String, CycleError> {
        let id = self
            .calendar
            .create_calendar(&self.calendar_name, &self.time_zone)
            .await?;
        self.store.put_calendar_id(&id)?;
        Ok(id)
    }

    /// Store read errors degrade to "absent"; only writes propagate.
    fn read_or_absent<T>(
        &self,
        result: Result<Option<T>, StoreError>,
        what: &'static str,
    ) -> Option<T> {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, what, "stored value unreadable, treating as absent");
                None
            }
        }
    }
}

fn term_start_millis(term_start: Option<chrono::DateTime<chrono::Utc>>) -> i64 {
    // unknown term start falls back to the epoch, so everything passes
    term_start.map(|t| t.timestamp_millis()).unwrap_or(0)
}

/// Keeps only events ending strictly after the term start and converts them.
fn filter_and_convert(
    events: &[RawEvent],
    term_start_ms: i64,
) -> Result<Vec<crate::calendar::CalendarEvent>, CycleError> {
    let mut converted = Vec::new();
    for event in events {
        let end_ms = parse_portal_datetime(&event.end)?.timestamp_millis();
        if end_ms > term_start_ms {
            converted.push(convert_event(event)?);
        }
    }
    Ok(converted)
}
