//! Conversion of scraped timetable entries into Calendar API events.

use super::types::{CalendarEvent, EventDateTime};
use crate::portal::RawEvent;
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

/// Fixed wall-clock format the portal uses for event start/end.
pub const PORTAL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// All portal timestamps are local to this zone.
pub const PORTAL_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

/// Calendar color tag for portal-sourced events (graphite).
const PORTAL_COLOR_ID: &str = "8";

/// A timestamp failed to parse against the fixed portal format, or names a
/// wall-clock time that does not exist in the portal timezone (DST gap).
#[derive(Debug, Clone, Error)]
#[error("timestamp {value:?} is not a valid portal date-time")]
pub struct DateFormatError {
    pub value: String,
}

/// Parses a portal wall-clock string as Europe/Berlin local time.
///
/// An ambiguous fall-back time (the repeated hour in October) resolves to
/// its earlier occurrence; only a nonexistent spring-forward time fails.
pub fn parse_portal_datetime(value: &str) -> Result<DateTime<Tz>, DateFormatError> {
    let naive = NaiveDateTime::parse_from_str(value, PORTAL_DATE_FORMAT).map_err(|_| {
        DateFormatError {
            value: value.to_string(),
        }
    })?;
    PORTAL_TIMEZONE
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| DateFormatError {
            value: value.to_string(),
        })
}

/// Derives the destination-side event from a scraped entry.
///
/// Deterministic; the only failure mode is a malformed timestamp.
pub fn convert_event(raw: &RawEvent) -> Result<CalendarEvent, DateFormatError> {
    Ok(CalendarEvent {
        summary: build_summary(raw),
        location: build_location(raw),
        description: build_description(raw),
        start: event_date_time(&raw.start)?,
        end: event_date_time(&raw.end)?,
        color_id: PORTAL_COLOR_ID.to_string(),
    })
}

/// Title: everything after the first `-` (trimmed) when a separator is
/// present, plus an instructor annotation when either instructor is set.
fn build_summary(raw: &RawEvent) -> String {
    let mut summary = match raw.title.split_once('-') {
        Some((_, rest)) => rest.trim().to_string(),
        None => raw.title.clone(),
    };

    if !raw.instructor.is_empty() || !raw.sinstructor.is_empty() {
        if raw.sinstructor.is_empty() || raw.instructor == raw.sinstructor {
            summary.push_str(&format!(" ({})", raw.instructor));
        } else {
            summary.push_str(&format!(" ({}, {})", raw.instructor, raw.sinstructor));
        }
    }

    summary
}

fn build_location(raw: &RawEvent) -> String {
    if raw.sroom.is_empty() || raw.room == raw.sroom {
        raw.room.clone()
    } else {
        format!("{} ({})", raw.room, raw.sroom)
    }
}

fn build_description(raw: &RawEvent) -> String {
    if raw.description == raw.remarks {
        raw.description.clone()
    } else if !raw.description.is_empty() && !raw.remarks.is_empty() {
        format!("{}; {}", raw.description, raw.remarks)
    } else {
        // exactly one of the two is non-empty
        format!("{}{}", raw.description, raw.remarks)
    }
}

fn event_date_time(value: &str) -> Result<EventDateTime, DateFormatError> {
    let parsed = parse_portal_datetime(value)?;
    Ok(EventDateTime {
        date_time: parsed.to_rfc3339(),
        time_zone: PORTAL_TIMEZONE.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, instructor: &str, sinstructor: &str) -> RawEvent {
        RawEvent {
            title: title.to_string(),
            instructor: instructor.to_string(),
            sinstructor: sinstructor.to_string(),
            room: "3.101".to_string(),
            sroom: String::new(),
            description: String::new(),
            remarks: String::new(),
            start: "2025-10-06 08:00".to_string(),
            end: "2025-10-06 09:30".to_string(),
        }
    }

    #[test]
    fn title_keeps_text_after_first_separator() {
        let event = convert_event(&raw("ABC101-Intro to Systems", "", "")).unwrap();
        assert_eq!(event.summary, "Intro to Systems");
    }

    #[test]
    fn title_without_separator_is_unchanged() {
        let event = convert_event(&raw("NoSeparatorTitle", "", "")).unwrap();
        assert_eq!(event.summary, "NoSeparatorTitle");
    }

    #[test]
    fn title_splits_only_on_first_separator() {
        let event = convert_event(&raw("M5-IT-Sicherheit", "", "")).unwrap();
        assert_eq!(event.summary, "IT-Sicherheit");
    }

    #[test]
    fn single_instructor_annotation() {
        let event = convert_event(&raw("T", "Smith", "")).unwrap();
        assert_eq!(event.summary, "T (Smith)");
    }

    #[test]
    fn distinct_instructors_are_both_listed() {
        let event = convert_event(&raw("T", "Smith", "Jones")).unwrap();
        assert_eq!(event.summary, "T (Smith, Jones)");
    }

    #[test]
    fn duplicate_instructor_is_listed_once() {
        let event = convert_event(&raw("T", "Smith", "Smith")).unwrap();
        assert_eq!(event.summary, "T (Smith)");
    }

    #[test]
    fn room_dedupes_equal_secondary() {
        let mut r = raw("T", "", "");
        r.room = "101".to_string();
        r.sroom = "101".to_string();
        assert_eq!(convert_event(&r).unwrap().location, "101");
    }

    #[test]
    fn distinct_secondary_room_is_parenthesized() {
        let mut r = raw("T", "", "");
        r.room = "101".to_string();
        r.sroom = "202".to_string();
        assert_eq!(convert_event(&r).unwrap().location, "101 (202)");
    }

    #[test]
    fn description_uses_the_non_empty_side() {
        let mut r = raw("T", "", "");
        r.description = "Lecture".to_string();
        assert_eq!(convert_event(&r).unwrap().description, "Lecture");

        r.description = String::new();
        r.remarks = "Bring laptop".to_string();
        assert_eq!(convert_event(&r).unwrap().description, "Bring laptop");
    }

    #[test]
    fn distinct_description_and_remarks_are_joined() {
        let mut r = raw("T", "", "");
        r.description = "A".to_string();
        r.remarks = "B".to_string();
        assert_eq!(convert_event(&r).unwrap().description, "A; B");
    }

    #[test]
    fn equal_description_and_remarks_collapse() {
        let mut r = raw("T", "", "");
        r.description = "X".to_string();
        r.remarks = "X".to_string();
        assert_eq!(convert_event(&r).unwrap().description, "X");
    }

    #[test]
    fn timestamps_become_berlin_qualified_rfc3339() {
        let event = convert_event(&raw("T", "", "")).unwrap();
        // October 6th is still CEST (+02:00)
        assert_eq!(event.start.date_time, "2025-10-06T08:00:00+02:00");
        assert_eq!(event.start.time_zone, "Europe/Berlin");
        assert_eq!(event.end.date_time, "2025-10-06T09:30:00+02:00");
    }

    #[test]
    fn winter_timestamps_use_cet_offset() {
        let mut r = raw("T", "", "");
        r.start = "2025-12-01 08:00".to_string();
        r.end = "2025-12-01 09:30".to_string();
        let event = convert_event(&r).unwrap();
        assert_eq!(event.start.date_time, "2025-12-01T08:00:00+01:00");
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let mut r = raw("T", "", "");
        r.end = "06.10.2025 09:30".to_string();
        assert!(convert_event(&r).is_err());
    }

    #[test]
    fn ambiguous_fall_back_time_resolves_to_earliest() {
        // 2:30 happens twice on the fall-back night; the first pass (CEST)
        // wins rather than failing the conversion
        let mut r = raw("T", "", "");
        r.start = "2025-10-26 02:30".to_string();
        r.end = "2025-10-26 03:30".to_string();
        let event = convert_event(&r).unwrap();
        assert_eq!(event.start.date_time, "2025-10-26T02:30:00+02:00");
    }

    #[test]
    fn dst_gap_time_is_rejected() {
        // 2:30 does not exist on the spring-forward night
        let mut r = raw("T", "", "");
        r.start = "2025-03-30 02:30".to_string();
        assert!(convert_event(&r).is_err());
    }

    #[test]
    fn color_id_marks_portal_events() {
        assert_eq!(convert_event(&raw("T", "", "")).unwrap().color_id, "8");
    }
}
