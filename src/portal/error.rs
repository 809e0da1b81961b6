//! Error types for the portal client.

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur while talking to Campus Dual.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The landing page after login did not contain the session-hash marker.
    /// Almost always means the credentials were rejected; can also mean the
    /// portal changed its page format.
    #[error("no session hash in login response (credentials likely invalid)")]
    Authentication,

    /// Network failure or a malformed payload on any portal endpoint.
    #[error("portal fetch failed: {message}")]
    Fetch { message: String },

    /// Login succeeded but the credentials could not be persisted.
    #[error("failed to persist session credentials")]
    Storage(#[from] StoreError),
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        PortalError::Fetch {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Fetch {
            message: format!("malformed portal response: {}", err),
        }
    }
}
