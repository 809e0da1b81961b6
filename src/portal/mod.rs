//! Campus Dual portal client.
//!
//! The portal is an SAP self-service frontend. Login runs against the ERP
//! host and yields a 32-character session hash; the JSON endpoints on the
//! self-service host (timeline, room/schedule) are keyed on that hash.

mod error;
mod login;
mod session;
mod types;

pub use error::PortalError;
pub use session::PortalSession;
pub use types::{EventWindow, RawEvent, TimelineEvent, TimelineFeed};
