//! Wire protocol between the panel and the content script
//!
//! Requests are JSON objects tagged by `action`; every reply is
//! `{"success": bool, "message": string}`, with `message` left out of the
//! `ping` acknowledgement.

use crate::tracking::TrackingError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Liveness probe used to detect whether the content script is loaded
    Ping,
    /// Locate an element and start tracking it
    MoveCursor { selector: String },
    ClickElement,
    HideCursor,
    CleanupAll,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::MoveCursor { .. } => "moveCursor",
            Request::ClickElement => "clickElement",
            Request::HideCursor => "hideCursor",
            Request::CleanupAll => "cleanupAll",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResponse {
    /// Bare acknowledgement, as sent for `ping`
    pub fn ack() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

impl From<TrackingError> for CommandResponse {
    fn from(err: TrackingError) -> Self {
        CommandResponse::failure(err.to_string())
    }
}
