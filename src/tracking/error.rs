//! Tracking errors
//!
//! Every failure a command can end in. The `Display` text is the message shown
//! to the user, so each variant reads as a complete sentence.

use crate::page::PageError;
use thiserror::Error;

/// Which operation an internal fault interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Locate,
    Click,
    Hide,
    Cleanup,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Locate => write!(f, "Error"),
            Operation::Click => write!(f, "Error clicking element"),
            Operation::Hide => write!(f, "Error hiding cursor"),
            Operation::Cleanup => write!(f, "Error during cleanup"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error("Element \"{0}\" not found")]
    NotFound(String),

    #[error("No element selected to click")]
    NoTarget,

    #[error("Cannot {action} on browser internal pages")]
    RestrictedContext { action: &'static str },

    #[error("Click was cancelled")]
    ClickCancelled,

    #[error("{operation}: {source}")]
    Internal {
        operation: Operation,
        source: PageError,
    },
}

impl TrackingError {
    pub fn internal(operation: Operation, source: PageError) -> Self {
        TrackingError::Internal { operation, source }
    }
}

/// Result type for tracking operations
pub type TrackingResult<T> = Result<T, TrackingError>;
