//! Page host trait
//!
//! Defines the surface the tracker needs from the page it runs in: element
//! lookup and geometry, overlay node management, synthetic clicks, and the
//! event-loop facilities (timers, listeners, intersection observers).

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a page host
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("Failed to execute 'querySelector': '{selector}' is not a valid selector")]
    InvalidSelector { selector: String },

    #[error("Target element is no longer part of the document")]
    Detached(ElementRef),

    #[error("Document is not available")]
    NoDocument,

    #[error("{0}")]
    Script(String),
}

/// Result type for page operations
pub type PageResult<T> = Result<T, PageError>;

/// Opaque handle to an element owned by the page host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// Handle to a periodic timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Handle to a registered event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle to an intersection observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Callback run by timers and listeners
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Callback run once after a delay
pub type OnceCallback = Box<dyn FnOnce() + Send>;

/// Callback receiving whether the observed element meets the threshold
pub type IntersectionCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Viewport-relative bounding box, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// An element with no area is not rendered
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Where a newly created node is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    Head,
    Body,
}

/// Page-level events the tracker listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEvent {
    /// Window scroll (registered passive)
    Scroll,
    /// Window resize (registered passive)
    Resize,
    /// Document visibility change
    VisibilityChange,
}

impl PageEvent {
    pub fn dom_name(&self) -> &'static str {
        match self {
            PageEvent::Scroll => "scroll",
            PageEvent::Resize => "resize",
            PageEvent::VisibilityChange => "visibilitychange",
        }
    }

    /// Scroll and resize fire at a high rate and never call preventDefault
    pub fn is_passive(&self) -> bool {
        matches!(self, PageEvent::Scroll | PageEvent::Resize)
    }
}

/// Document visibility as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Visible,
    Hidden,
}

/// Tag name and id of an element, used in user-facing messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSummary {
    pub tag: String,
    pub id: Option<String>,
}

impl std::fmt::Display for ElementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag.to_lowercase())?;
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            write!(f, "#{}", id)?;
        }
        Ok(())
    }
}

/// The page a tracker runs against
///
/// Implementations must not invoke registered callbacks from inside any of
/// these methods; callbacks only run from the host's own event loop.
pub trait Page: Send + Sync {
    /// First element in document order matching `selector`
    fn query_selector(&self, selector: &str) -> PageResult<Option<ElementRef>>;

    /// Current viewport-relative bounding box of an element
    fn bounding_rect(&self, element: ElementRef) -> PageResult<Rect>;

    /// Tag name and id of an element
    fn describe(&self, element: ElementRef) -> PageResult<ElementSummary>;

    /// Smoothly scroll so the element sits in the middle of the viewport
    fn scroll_into_view(&self, element: ElementRef) -> PageResult<()>;

    /// Dispatch a bubbling, cancelable click at viewport point (x, y).
    ///
    /// Returns `false` when a page handler cancelled the event.
    fn dispatch_click(&self, element: ElementRef, x: f64, y: f64) -> PageResult<bool>;

    /// Element carrying the given DOM id, if any
    fn node_by_id(&self, dom_id: &str) -> Option<ElementRef>;

    /// Create an element with a DOM id and attach it to the head or body
    fn create_node(&self, tag: &str, dom_id: &str, mount: Mount) -> PageResult<ElementRef>;

    /// Set an inline style property (kebab-case name)
    fn set_style(&self, element: ElementRef, property: &str, value: &str) -> PageResult<()>;

    /// Read an inline style property; `None` when unset
    fn style(&self, element: ElementRef, property: &str) -> PageResult<Option<String>>;

    fn set_text(&self, element: ElementRef, text: &str) -> PageResult<()>;

    /// Detach a node from the document. Removing a detached node is a no-op.
    fn remove_node(&self, element: ElementRef) -> PageResult<()>;

    fn is_attached(&self, element: ElementRef) -> bool;

    /// Drop the host's hold on an element handle. The element itself stays
    /// in the document; the handle must not be used afterwards.
    fn release_element(&self, element: ElementRef);

    /// Rendered (offset) width and height of an element
    fn offset_size(&self, element: ElementRef) -> PageResult<(f64, f64)>;

    fn set_interval(&self, period: Duration, callback: Callback) -> PageResult<TimerId>;

    /// Cancel a timer. Unknown ids are ignored.
    fn clear_interval(&self, timer: TimerId);

    /// Schedule a one-shot callback; it cannot be cancelled
    fn set_timeout(&self, delay: Duration, callback: OnceCallback) -> PageResult<()>;

    fn add_listener(&self, event: PageEvent, callback: Callback) -> PageResult<ListenerId>;

    /// Unregister a listener. Unknown ids are ignored.
    fn remove_listener(&self, listener: ListenerId);

    /// Watch an element's intersection with the viewport at `threshold`
    fn observe_intersection(
        &self,
        element: ElementRef,
        threshold: f64,
        callback: IntersectionCallback,
    ) -> PageResult<ObserverId>;

    /// Disconnect an observer. Unknown ids are ignored.
    fn disconnect_observer(&self, observer: ObserverId);

    fn visibility_state(&self) -> VisibilityState;
}
