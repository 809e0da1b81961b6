//! Calendar API seam and the Google implementation.

use super::batch::{
    batch_boundary, boundary_from_content_type, build_batch_body, parse_batch_response, BATCH_SIZE,
};
use super::error::CalendarError;
use super::types::{BatchReport, CalendarEvent};
use crate::config::CalendarConfig;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Concurrent batch round trips in flight at once.
const MAX_IN_FLIGHT_BATCHES: usize = 4;

/// The destination-calendar operations the sync cycle needs.
///
/// The engine depends on this trait, not on the Google client, so tests can
/// substitute a recording implementation.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Creates a calendar and returns the service-assigned id.
    async fn create_calendar(&self, name: &str, time_zone: &str)
        -> Result<String, CalendarError>;

    /// Deletes a calendar. A calendar that is already gone is not an error.
    async fn delete_calendar(&self, calendar_id: &str) -> Result<(), CalendarError>;

    /// Batch-inserts events, 50 per round trip. Per-item failures are
    /// reported, not raised.
    async fn insert_events(
        &self,
        calendar_id: &str,
        events: &[CalendarEvent],
    ) -> Result<BatchReport, CalendarError>;
}

#[derive(Debug, Deserialize)]
struct CreatedCalendar {
    id: String,
}

/// Google Calendar v3 client.
///
/// TLS verification is always strict here; only the portal client may relax
/// it (see `portal::session`).
#[derive(Debug)]
pub struct GoogleCalendar {
    client: Client,
    config: CalendarConfig,
    /// Path component of the API base URL, reused inside batch parts.
    base_path: String,
    token: String,
}

impl GoogleCalendar {
    /// Builds the client and reads the bearer token from the configured
    /// token file. Token acquisition and refresh live outside this crate.
    pub fn new(config: CalendarConfig) -> Result<Self, CalendarError> {
        let token = fs::read_to_string(&config.token_path)
            .map_err(|e| CalendarError::Token {
                message: format!("cannot read {}: {}", config.token_path, e),
            })?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(CalendarError::Token {
                message: format!("token file {} is empty", config.token_path),
            });
        }

        let base_path = Url::parse(&config.api_base_url)
            .map(|u| u.path().trim_end_matches('/').to_string())
            .map_err(|e| CalendarError::Api {
                status: 0,
                message: format!("invalid API base URL: {}", e),
            })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CalendarError::Network {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            base_path,
            token,
        })
    }

    async fn send_batch(
        &self,
        calendar_id: &str,
        offset: usize,
        chunk: &[CalendarEvent],
    ) -> Result<BatchReport, CalendarError> {
        let boundary = batch_boundary();
        let events_path = format!("{}/calendars/{}/events", self.base_path, calendar_id);
        let body = build_batch_body(&events_path, chunk, &boundary)?;

        let response = self
            .client
            .post(&self.config.batch_url)
            .bearer_auth(&self.token)
            .header(
                CONTENT_TYPE,
                format!("multipart/mixed; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let response_boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type)
            .ok_or_else(|| CalendarError::Batch {
                message: "batch response without multipart boundary".to_string(),
            })?;

        let text = response.text().await?;
        parse_batch_response(&text, &response_boundary, chunk, offset)
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn create_calendar(
        &self,
        name: &str,
        time_zone: &str,
    ) -> Result<String, CalendarError> {
        let url = format!("{}/calendars", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "summary": name, "timeZone": time_zone }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let created: CreatedCalendar =
            serde_json::from_str(&response.text().await?).map_err(|e| CalendarError::Api {
                status: status.as_u16(),
                message: format!("malformed create response: {}", e),
            })?;
        info!(calendar_id = %created.id, "created destination calendar");
        Ok(created.id)
    }

    async fn delete_calendar(&self, calendar_id: &str) -> Result<(), CalendarError> {
        let url = format!("{}/calendars/{}", self.config.api_base_url, calendar_id);
        let response = self.client.delete(&url).bearer_auth(&self.token).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            warn!(calendar_id = %calendar_id, "calendar already gone, nothing to delete");
            return Ok(());
        }
        if !status.is_success() {
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        info!(calendar_id = %calendar_id, "deleted destination calendar");
        Ok(())
    }

    async fn insert_events(
        &self,
        calendar_id: &str,
        events: &[CalendarEvent],
    ) -> Result<BatchReport, CalendarError> {
        if events.is_empty() {
            return Ok(BatchReport::default());
        }

        let batches: Vec<_> = events
            .chunks(BATCH_SIZE)
            .enumerate()
            .map(|(i, chunk)| self.send_batch(calendar_id, i * BATCH_SIZE, chunk))
            .collect();
        let results: Vec<Result<BatchReport, CalendarError>> = stream::iter(batches)
            .buffer_unordered(MAX_IN_FLIGHT_BATCHES)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for result in results {
            report.merge(result?);
        }
        info!(
            calendar_id = %calendar_id,
            attempted = report.attempted,
            inserted = report.inserted,
            failed = report.failures.len(),
            "batch upload finished"
        );
        Ok(report)
    }
}
