//! HTTP client for the Campus Dual portal.
//!
//! Handles the SAP login handshake:
//! 1. GET the init page and collect the hidden form fields (incl. XSRF token)
//! 2. POST the credentials plus the fields verbatim to the form action
//! 3. GET the landing page and pull the session hash out of the raw body
//!
//! and the two read endpoints keyed on that hash (timeline, room/json).

use super::error::PortalError;
use super::login::{extract_session_hash, parse_login_form};
use super::types::{EventWindow, RawEvent, TimelineFeed};
use crate::config::PortalConfig;
use crate::store::{SessionCredentials, SyncStore};
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, warn};

/// Init-page path on the ERP host. The `uri` parameter tells the portal
/// where to land after login.
const INIT_PATH: &str = "/sap/bc/webdynpro/sap/zba_initss";
/// Landing page on the self-service host; its body embeds the session hash.
const LANDING_PATH: &str = "/index/login";
/// Timeline feed used for term-start discovery.
const TIMELINE_PATH: &str = "/dash/gettimeline";
/// Schedule endpoint returning the raw event array.
const SCHEDULE_PATH: &str = "/room/json";

/// English RFC 1123-style format the timeline feed uses.
const TIMELINE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// An authenticated portal session.
#[derive(Debug)]
pub struct PortalSession {
    client: Client,
    config: PortalConfig,
    username: String,
    hash: String,
}

impl PortalSession {
    /// Runs the full login handshake and persists the resulting credentials.
    ///
    /// Nothing is persisted when the hash marker is absent from the landing
    /// page (`PortalError::Authentication`).
    pub async fn login(
        config: &PortalConfig,
        store: &SyncStore,
        username: &str,
        password: &str,
    ) -> Result<Self, PortalError> {
        let client = build_client(config)?;

        let init_url = format!(
            "{}{}?sap-client=100&sap-language=de&uri={}{}",
            config.erp_base_url, INIT_PATH, config.ss_base_url, LANDING_PATH
        );
        let init_html = client.get(&init_url).send().await?.text().await?;
        let form = parse_login_form(&init_html)?;

        let login_url = format!("{}{}", config.erp_base_url, form.action);
        client
            .post(&login_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form.post_body(username, password))
            .send()
            .await?;

        let landing_url = format!("{}{}", config.ss_base_url, LANDING_PATH);
        let landing = client.get(&landing_url).send().await?.text().await?;
        let hash = extract_session_hash(&landing).ok_or(PortalError::Authentication)?;

        store.put_credentials(&SessionCredentials {
            username: username.to_string(),
            session_hash: hash.clone(),
        })?;

        info!(
            user = %username,
            session = %hash_digest(&hash),
            "portal login succeeded"
        );

        Ok(Self {
            client,
            config: config.clone(),
            username: username.to_string(),
            hash,
        })
    }

    /// Resumes a session from previously stored credentials, without a
    /// network round trip. The hash is only validated by its first use.
    pub fn resume(
        config: &PortalConfig,
        credentials: SessionCredentials,
    ) -> Result<Self, PortalError> {
        let client = build_client(config)?;
        Ok(Self {
            client,
            config: config.clone(),
            username: credentials.username,
            hash: credentials.session_hash,
        })
    }

    /// Fetches the current academic-term start from the dashboard timeline.
    ///
    /// This is a best-effort lookup: `None` means the feed was unreachable
    /// or unparseable, and callers fall back to the Unix epoch. A readable
    /// feed with no future "Theorie" block yields the current time.
    pub async fn fetch_term_start(&self) -> Option<DateTime<Utc>> {
        match self.request_term_start().await {
            Ok(start) => Some(start),
            Err(e) => {
                warn!(error = %e, "term start lookup failed, treating as unknown");
                None
            }
        }
    }

    async fn request_term_start(&self) -> Result<DateTime<Utc>, PortalError> {
        let url = format!("{}{}", self.config.ss_base_url, TIMELINE_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("user", self.username.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PortalError::Fetch {
                message: format!("timeline endpoint returned {}", response.status()),
            });
        }

        let feed: TimelineFeed = serde_json::from_str(&response.text().await?)?;
        term_start_from_timeline(&feed, Utc::now())
    }

    /// Fetches the raw event list for the given window.
    pub async fn fetch_events(&self, window: &EventWindow) -> Result<Vec<RawEvent>, PortalError> {
        let url = format!("{}{}", self.config.ss_base_url, SCHEDULE_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("userid", self.username.clone()),
                ("hash", self.hash.clone()),
                ("start", window.start.to_string()),
                ("end", window.end.to_string()),
                // cache buster, epoch millis as the portal frontend sends it
                ("_", Utc::now().timestamp_millis().to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PortalError::Fetch {
                message: format!("schedule endpoint returned {}", response.status()),
            });
        }

        let events: Vec<RawEvent> = serde_json::from_str(&response.text().await?)?;
        info!(
            user = %self.username,
            session = %hash_digest(&self.hash),
            count = events.len(),
            "fetched schedule events"
        );
        Ok(events)
    }
}

/// Builds the portal HTTP client.
///
/// The cookie store is required: without a jar the portal does not
/// recognise the session when the landing page is requested.
///
/// SECURITY NOTE: when `accept_invalid_certs` is set, certificate
/// validation is disabled for this client. The Campus Dual hosts serve an
/// incomplete CA chain, so the default config enables it for the portal
/// client ONLY. No other client in this crate relaxes verification.
fn build_client(config: &PortalConfig) -> Result<Client, PortalError> {
    let mut builder = Client::builder()
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30));
    if config.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().map_err(|e| PortalError::Fetch {
        message: format!("failed to build HTTP client: {}", e),
    })
}

/// Scans the timeline for the first "Theorie" block whose end is still in
/// the future and returns its start. Falls back to `now` when none exists.
fn term_start_from_timeline(
    feed: &TimelineFeed,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, PortalError> {
    for event in &feed.events {
        if event.title != "Theorie" {
            continue;
        }
        let start = parse_timeline_date(&event.start)?;
        let end = parse_timeline_date(&event.end)?;
        if end > now {
            return Ok(start);
        }
    }
    Ok(now)
}

fn parse_timeline_date(value: &str) -> Result<DateTime<Utc>, PortalError> {
    DateTime::parse_from_str(value, TIMELINE_DATE_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PortalError::Fetch {
            message: format!("malformed timeline date {:?}: {}", value, e),
        })
}

/// Truncated SHA-256 digest standing in for the session hash in logs; the
/// raw hash never appears there.
fn hash_digest(hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hash.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!("{}...", hex)
}
