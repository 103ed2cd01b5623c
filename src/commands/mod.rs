//! Command handling
//!
//! The request/response protocol spoken between the panel and the content
//! script, the dispatcher that executes it against a tracker, and the
//! panel-side client that sends it.

pub mod client;
pub mod dispatcher;
pub mod protocol;

pub use client::{is_restricted_url, ClientError, ClientResult, CursorClient, TabInfo, Transport};
pub use dispatcher::{Dispatcher, Envelope};
pub use protocol::{CommandResponse, Request};
