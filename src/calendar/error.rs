//! Error types for the Google Calendar client.

use thiserror::Error;

/// Errors that can occur while talking to the Calendar API.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Network/HTTP request failed
    #[error("calendar network error: {message}")]
    Network { message: String },

    /// The API returned a non-success status
    #[error("calendar API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The bearer token file is missing or empty
    #[error("calendar access token unavailable: {message}")]
    Token { message: String },

    /// The multipart batch response could not be parsed
    #[error("unparseable batch response: {message}")]
    Batch { message: String },
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        CalendarError::Network {
            message: err.to_string(),
        }
    }
}
