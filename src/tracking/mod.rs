//! Element tracking
//!
//! The state machine behind the virtual cursor: one tracked element at a time,
//! kept in sync with the page by a reconciliation timer plus scroll, resize,
//! visibility and intersection callbacks.

pub mod error;
pub mod session;
pub mod tracker;

pub use error::{Operation, TrackingError, TrackingResult};
pub use session::{TrackedTarget, TrackingHandles, TrackingState};
pub use tracker::{Tracker, TrackerStatus};
