//! Google batch protocol plumbing.
//!
//! The Calendar v3 batch endpoint takes a `multipart/mixed` body where every
//! part wraps one `application/http` request, and answers in kind: one part
//! per item, correlated through `Content-ID`, each carrying an embedded HTTP
//! status line.

use super::error::CalendarError;
use super::types::{BatchFailure, BatchReport, CalendarEvent};
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

/// Events per batch round trip (Calendar batch API limit).
pub const BATCH_SIZE: usize = 50;

// Static patterns for the semi-structured multipart response
static CONTENT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Content-ID:\s*<?response-item:(\d+)>?").unwrap());
static STATUS_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HTTP/\d\.\d\s+(\d{3})").unwrap());
static BOUNDARY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"boundary="?([^";,\s]+)"?"#).unwrap());

/// Generates a request boundary that cannot collide with event payloads.
pub fn batch_boundary() -> String {
    format!("batch_{:016x}", rand::thread_rng().gen::<u64>())
}

/// Extracts the part boundary from a `Content-Type` response header.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    BOUNDARY_REGEX
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Builds the `multipart/mixed` body for one batch of event inserts.
///
/// `events_path` is the path-only insert target, e.g.
/// `/calendar/v3/calendars/<id>/events`.
pub fn build_batch_body(
    events_path: &str,
    events: &[CalendarEvent],
    boundary: &str,
) -> Result<String, CalendarError> {
    let mut body = String::new();
    for (index, event) in events.iter().enumerate() {
        let payload = serde_json::to_string(event).map_err(|e| CalendarError::Batch {
            message: format!("failed to serialize event: {}", e),
        })?;
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str(&format!("Content-ID: <item:{}>\r\n\r\n", index));
        body.push_str(&format!("POST {} HTTP/1.1\r\n", events_path));
        body.push_str("Content-Type: application/json\r\n\r\n");
        body.push_str(&payload);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    Ok(body)
}

/// Parses a multipart batch response back into per-item outcomes.
///
/// `offset` is the position of this chunk's first event in the overall
/// upload order, so failure indices line up across batches. Response parts
/// that do not correlate to an event in `chunk` are ignored.
pub fn parse_batch_response(
    body: &str,
    boundary: &str,
    chunk: &[CalendarEvent],
    offset: usize,
) -> Result<BatchReport, CalendarError> {
    let delimiter = format!("--{}", boundary);
    let mut report = BatchReport {
        attempted: chunk.len(),
        ..BatchReport::default()
    };

    let mut parts_seen = 0usize;
    for segment in body.split(&delimiter).skip(1) {
        if segment.starts_with("--") {
            break; // closing delimiter
        }
        let item = CONTENT_ID_REGEX
            .captures(segment)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok());
        let status = STATUS_LINE_REGEX
            .captures(segment)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u16>().ok());

        let (Some(item), Some(status)) = (item, status) else {
            return Err(CalendarError::Batch {
                message: "response part without Content-ID or status line".to_string(),
            });
        };
        parts_seen += 1;

        let Some(event) = chunk.get(item) else {
            continue;
        };
        if (200..300).contains(&status) {
            report.inserted += 1;
        } else {
            report.failures.push(BatchFailure {
                index: offset + item,
                status,
                summary: event.summary.clone(),
            });
        }
    }

    if parts_seen == 0 {
        return Err(CalendarError::Batch {
            message: "no parts found in batch response".to_string(),
        });
    }

    Ok(report)
}
