//! Application configuration, loaded from a JSON file.
//!
//! Defaults carry the production values, so running without a config file
//! works against the real services. Base URLs exist as fields mainly so
//! tests can point the clients at a local mock server.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Campus Dual endpoints and TLS policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// SAP ERP host handling the login handshake.
    pub erp_base_url: String,
    /// Self-service host serving the JSON endpoints.
    pub ss_base_url: String,
    /// Accept an invalid certificate chain from the portal.
    ///
    /// The Campus Dual servers do not send their complete CA chain, so this
    /// defaults to `true`. It applies to the portal client ONLY and must
    /// stay off for every other host.
    pub accept_invalid_certs: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            erp_base_url: "https://erp.campus-dual.de".to_string(),
            ss_base_url: "https://selfservice.campus-dual.de".to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// Google Calendar endpoints and destination-calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub api_base_url: String,
    pub batch_url: String,
    /// Display name of the destination calendar.
    pub calendar_name: String,
    /// Timezone of the destination calendar and of every uploaded event.
    pub time_zone: String,
    /// File holding the OAuth bearer token; acquisition and refresh are an
    /// external concern.
    pub token_path: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            batch_url: "https://www.googleapis.com/batch/calendar/v3".to_string(),
            calendar_name: "Campus Dual".to_string(),
            time_zone: "Europe/Berlin".to_string(),
            token_path: "google_token.txt".to_string(),
        }
    }
}

/// State-store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "campusdual.sqlite3".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub calendar: CalendarConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Loads the config file at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}
