//! Engine integration tests: a wiremock portal, an in-memory store, and a
//! recording calendar client standing in for Google.

use async_trait::async_trait;
use campusdual_sync::calendar::{BatchReport, CalendarApi, CalendarError, CalendarEvent};
use campusdual_sync::config::{CalendarConfig, PortalConfig};
use campusdual_sync::portal::RawEvent;
use campusdual_sync::store::{SessionCredentials, SyncStore};
use campusdual_sync::sync::{Snapshot, SyncEngine, SyncOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Term start the timeline mock announces: 2099-10-05 00:00 Berlin (CEST).
const TIMELINE_BODY: &str = r#"{"events":[
    {"title":"Praxis","start":"Wed, 01 Apr 2099 00:00:00 +0200","end":"Sun, 04 Oct 2099 00:00:00 +0200"},
    {"title":"Theorie","start":"Mon, 05 Oct 2099 00:00:00 +0200","end":"Fri, 26 Feb 2100 00:00:00 +0100"}
]}"#;

#[derive(Default)]
struct RecorderState {
    fail_create: bool,
    counter: AtomicUsize,
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    inserted: Mutex<Vec<(String, Vec<CalendarEvent>)>>,
}

/// CalendarApi double that records every call.
#[derive(Clone, Default)]
struct RecordingCalendar {
    state: Arc<RecorderState>,
}

impl RecordingCalendar {
    fn failing_create() -> Self {
        Self {
            state: Arc::new(RecorderState {
                fail_create: true,
                ..RecorderState::default()
            }),
        }
    }

    fn created(&self) -> Vec<String> {
        self.state.created.lock().unwrap().clone()
    }

    fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }

    fn inserted(&self) -> Vec<(String, Vec<CalendarEvent>)> {
        self.state.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarApi for RecordingCalendar {
    async fn create_calendar(
        &self,
        _name: &str,
        _time_zone: &str,
    ) -> Result<String, CalendarError> {
        if self.state.fail_create {
            return Err(CalendarError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        let id = format!("cal-{}", self.state.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.state.created.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn delete_calendar(&self, calendar_id: &str) -> Result<(), CalendarError> {
        self.state
            .deleted
            .lock()
            .unwrap()
            .push(calendar_id.to_string());
        Ok(())
    }

    async fn insert_events(
        &self,
        calendar_id: &str,
        events: &[CalendarEvent],
    ) -> Result<BatchReport, CalendarError> {
        self.state
            .inserted
            .lock()
            .unwrap()
            .push((calendar_id.to_string(), events.to_vec()));
        Ok(BatchReport {
            attempted: events.len(),
            inserted: events.len(),
            failures: Vec::new(),
        })
    }
}

fn raw_event(title: &str, start: &str, end: &str) -> RawEvent {
    RawEvent {
        title: title.to_string(),
        instructor: "Kern".to_string(),
        sinstructor: String::new(),
        room: "3.101".to_string(),
        sroom: String::new(),
        description: String::new(),
        remarks: String::new(),
        start: start.to_string(),
        end: end.to_string(),
    }
}

async fn mock_portal(events: &[RawEvent]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dash/gettimeline"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TIMELINE_BODY))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/room/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(serde_json::to_string(events).unwrap()),
        )
        .mount(&server)
        .await;
    server
}

fn portal_config(server: &MockServer) -> PortalConfig {
    PortalConfig {
        erp_base_url: server.uri(),
        ss_base_url: server.uri(),
        accept_invalid_certs: false,
    }
}

fn store_with_credentials() -> Arc<SyncStore> {
    let store = Arc::new(SyncStore::open_in_memory().unwrap());
    store
        .put_credentials(&SessionCredentials {
            username: "s123".to_string(),
            session_hash: "0123456789abcdef0123456789abcdef".to_string(),
        })
        .unwrap();
    store
}

fn engine(
    store: Arc<SyncStore>,
    portal: PortalConfig,
    calendar: RecordingCalendar,
) -> SyncEngine<RecordingCalendar> {
    SyncEngine::new(store, portal, &CalendarConfig::default(), calendar)
}

#[tokio::test]
async fn second_run_with_unchanged_snapshot_touches_nothing() {
    let events = vec![
        raw_event("M1-Mathe", "2099-10-06 08:00", "2099-10-06 09:30"),
        raw_event("M2-Datenbanken", "2099-10-06 10:00", "2099-10-06 11:30"),
    ];
    let server = mock_portal(&events).await;
    let store = store_with_credentials();
    let calendar = RecordingCalendar::default();
    let engine = engine(store.clone(), portal_config(&server), calendar.clone());

    // first run: lazily creates the calendar, then rebuilds it because the
    // stored snapshot starts out empty
    assert_eq!(engine.run().await, SyncOutcome::Success);
    assert_eq!(calendar.created(), vec!["cal-1", "cal-2"]);
    assert_eq!(calendar.deleted(), vec!["cal-1"]);
    assert_eq!(calendar.inserted().len(), 1);
    assert_eq!(store.calendar_id().unwrap().as_deref(), Some("cal-2"));

    // second run: unchanged snapshot, no calendar traffic at all
    assert_eq!(engine.run().await, SyncOutcome::Success);
    assert_eq!(calendar.created(), vec!["cal-1", "cal-2"]);
    assert_eq!(calendar.deleted(), vec!["cal-1"]);
    assert_eq!(calendar.inserted().len(), 1);
}

#[tokio::test]
async fn changed_snapshot_rebuilds_the_calendar_exactly_once() {
    let old_events = vec![raw_event("M1-Mathe", "2099-10-06 08:00", "2099-10-06 09:30")];
    let new_events = vec![
        raw_event("M1-Mathe", "2099-10-06 08:00", "2099-10-06 09:30"),
        raw_event("M3-Recht", "2099-10-07 08:00", "2099-10-07 09:30"),
    ];
    let server = mock_portal(&new_events).await;
    let store = store_with_credentials();
    store
        .put_snapshot(Snapshot::canonicalize(&old_events).as_str())
        .unwrap();
    store.put_calendar_id("cal-old").unwrap();

    let calendar = RecordingCalendar::default();
    let engine = engine(store.clone(), portal_config(&server), calendar.clone());

    assert_eq!(engine.run().await, SyncOutcome::Success);
    assert_eq!(calendar.deleted(), vec!["cal-old"]);
    assert_eq!(calendar.created(), vec!["cal-1"]);
    assert_eq!(store.calendar_id().unwrap().as_deref(), Some("cal-1"));

    let uploads = calendar.inserted();
    assert_eq!(uploads.len(), 1);
    let (target, uploaded) = &uploads[0];
    assert_eq!(target, "cal-1");
    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0].summary, "Mathe (Kern)");
    assert_eq!(uploaded[1].summary, "Recht (Kern)");
}

#[tokio::test]
async fn events_ending_at_term_start_are_filtered_out() {
    // term start is 2099-10-05 00:00 Berlin; the first event ends exactly
    // there and must be excluded, the second ends later and survives
    let events = vec![
        raw_event("M0-Altlast", "2099-10-04 22:30", "2099-10-05 00:00"),
        raw_event("M1-Mathe", "2099-10-05 08:00", "2099-10-05 09:30"),
    ];
    let server = mock_portal(&events).await;
    let store = store_with_credentials();
    let calendar = RecordingCalendar::default();
    let engine = engine(store, portal_config(&server), calendar.clone());

    assert_eq!(engine.run().await, SyncOutcome::Success);
    let uploads = calendar.inserted();
    assert_eq!(uploads.len(), 1);
    let summaries: Vec<&str> = uploads[0].1.iter().map(|e| e.summary.as_str()).collect();
    assert_eq!(summaries, vec!["Mathe (Kern)"]);
}

#[tokio::test]
async fn missing_credentials_mean_retry_without_any_calls() {
    let server = mock_portal(&[]).await;
    let store = Arc::new(SyncStore::open_in_memory().unwrap());
    let calendar = RecordingCalendar::default();
    let engine = engine(store, portal_config(&server), calendar.clone());

    assert_eq!(engine.run().await, SyncOutcome::Retry);
    assert!(calendar.created().is_empty());
    assert!(calendar.deleted().is_empty());
    assert!(calendar.inserted().is_empty());
}

#[tokio::test]
async fn portal_failure_means_retry_and_keeps_the_stored_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dash/gettimeline"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TIMELINE_BODY))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/room/json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = store_with_credentials();
    let old = vec![raw_event("M1-Mathe", "2099-10-06 08:00", "2099-10-06 09:30")];
    let old_snapshot = Snapshot::canonicalize(&old);
    store.put_snapshot(old_snapshot.as_str()).unwrap();

    let calendar = RecordingCalendar::default();
    let engine = engine(store.clone(), portal_config(&server), calendar.clone());

    assert_eq!(engine.run().await, SyncOutcome::Retry);
    assert!(calendar.deleted().is_empty());
    assert_eq!(
        store.snapshot().unwrap().unwrap().body,
        old_snapshot.as_str()
    );
}

#[tokio::test]
async fn fresh_snapshot_is_persisted_even_when_the_calendar_fails() {
    let events = vec![raw_event("M1-Mathe", "2099-10-06 08:00", "2099-10-06 09:30")];
    let server = mock_portal(&events).await;
    let store = store_with_credentials();
    let calendar = RecordingCalendar::failing_create();
    let engine = engine(store.clone(), portal_config(&server), calendar.clone());

    assert_eq!(engine.run().await, SyncOutcome::Retry);
    // the fetch itself succeeded, so the snapshot moved forward regardless
    assert_eq!(
        store.snapshot().unwrap().unwrap().body,
        Snapshot::canonicalize(&events).as_str()
    );
    assert!(store.calendar_id().unwrap().is_none());
}
