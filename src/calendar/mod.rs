//! Google Calendar side: event conversion and the REST/batch client.

mod batch;
mod client;
mod convert;
mod error;
mod types;

pub use client::{CalendarApi, GoogleCalendar};
pub use convert::{convert_event, parse_portal_datetime, DateFormatError, PORTAL_TIMEZONE};
pub use error::CalendarError;
pub use types::{BatchFailure, BatchReport, CalendarEvent, EventDateTime};
