//! Page host implementations
//!
//! The tracker talks to the page through the [`Page`] trait. The simulated
//! host runs everywhere; the browser host lives in [`crate::web`] and is only
//! compiled for wasm32.

pub mod simulated;
pub mod traits;

pub use simulated::{DispatchedClick, ElementSpec, SimulatedPage};
pub use traits::{
    Callback, ElementRef, ElementSummary, IntersectionCallback, ListenerId, Mount, ObserverId,
    OnceCallback, Page, PageError, PageEvent, PageResult, Rect, TimerId, VisibilityState,
};
