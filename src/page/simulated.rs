//! In-memory page host
//!
//! A small document model with a viewport, a scroll offset and a virtual
//! clock. It backs the test suite and lets the tracker run headless. Callbacks
//! only fire from the driver methods (`advance`, `scroll_to`, `resize`,
//! `set_visibility`, `set_element_rect`), never from inside a `Page` call, and
//! always with the internal lock released.

use crate::page::traits::{
    Callback, ElementRef, ElementSummary, IntersectionCallback, ListenerId, Mount, ObserverId,
    OnceCallback, Page, PageError, PageEvent, PageResult, Rect, TimerId, VisibilityState,
};
use parking_lot::Mutex as ParkingMutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Description of an element to add to a simulated page
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    rect: Rect,
    cancels_clicks: bool,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_uppercase(),
            id: None,
            classes: Vec::new(),
            rect: Rect::default(),
            cancels_clicks: false,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    /// Position in document coordinates
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Click handlers on this element call preventDefault
    pub fn cancel_clicks(mut self) -> Self {
        self.cancels_clicks = true;
        self
    }
}

/// A click recorded by [`SimulatedPage::dispatch_click`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchedClick {
    pub element: ElementRef,
    pub x: f64,
    pub y: f64,
}

struct Node {
    tag: String,
    dom_id: Option<String>,
    classes: Vec<String>,
    rect: Rect,
    styles: HashMap<String, String>,
    text: String,
    mount: Option<Mount>,
    cancels_clicks: bool,
}

struct Interval {
    period: Duration,
    next_due: Duration,
    callback: Callback,
}

struct Timeout {
    due: Duration,
    callback: OnceCallback,
}

struct Observer {
    element: ElementRef,
    threshold: f64,
    last: Option<bool>,
    callback: IntersectionCallback,
}

struct PageState {
    viewport: (f64, f64),
    scroll: (f64, f64),
    visibility: VisibilityState,
    pending_scroll: bool,
    now: Duration,
    next_handle: u64,
    nodes: Vec<Node>,
    intervals: BTreeMap<u64, Interval>,
    timeouts: BTreeMap<u64, Timeout>,
    listeners: BTreeMap<u64, (PageEvent, Callback)>,
    observers: BTreeMap<u64, Observer>,
    clicks: Vec<DispatchedClick>,
    released: Vec<ElementRef>,
}

impl PageState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn node(&self, element: ElementRef) -> PageResult<&Node> {
        self.nodes
            .get(element.0 as usize)
            .filter(|node| node.mount.is_some())
            .ok_or(PageError::Detached(element))
    }

    fn node_mut(&mut self, element: ElementRef) -> PageResult<&mut Node> {
        self.nodes
            .get_mut(element.0 as usize)
            .filter(|node| node.mount.is_some())
            .ok_or(PageError::Detached(element))
    }

    fn viewport_rect(&self, node: &Node) -> Rect {
        if node.styles.get("position").map(String::as_str) == Some("fixed") {
            return Rect::new(
                px(node.styles.get("left")),
                px(node.styles.get("top")),
                px(node.styles.get("width")),
                px(node.styles.get("height")),
            );
        }
        Rect::new(
            node.rect.left - self.scroll.0,
            node.rect.top - self.scroll.1,
            node.rect.width,
            node.rect.height,
        )
    }

    fn intersection_ratio(&self, element: ElementRef) -> f64 {
        let Ok(node) = self.node(element) else {
            return 0.0;
        };
        let rect = self.viewport_rect(node);
        let area = rect.width * rect.height;
        if area <= 0.0 {
            return 0.0;
        }
        let visible_w =
            (rect.left + rect.width).min(self.viewport.0) - rect.left.max(0.0);
        let visible_h =
            (rect.top + rect.height).min(self.viewport.1) - rect.top.max(0.0);
        if visible_w <= 0.0 || visible_h <= 0.0 {
            return 0.0;
        }
        (visible_w * visible_h) / area
    }

    fn listeners_for(&self, event: PageEvent) -> Vec<Callback> {
        self.listeners
            .values()
            .filter(|(kind, _)| *kind == event)
            .map(|(_, callback)| callback.clone())
            .collect()
    }
}

/// Parse a CSS pixel length such as `"20px"`; anything else reads as zero
fn px(value: Option<&String>) -> f64 {
    value
        .and_then(|v| v.trim().strip_suffix("px"))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// One compound selector: optional tag, then any number of `#id` / `.class`
#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        let id_ok = self
            .ids
            .iter()
            .all(|id| node.dom_id.as_deref() == Some(id.as_str()));
        let class_ok = self
            .classes
            .iter()
            .all(|class| node.classes.iter().any(|c| c == class));
        id_ok && class_ok
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Parse a comma-separated list of compound selectors.
///
/// Combinators and attribute selectors are outside what the simulated host
/// understands and are reported as invalid.
fn parse_selector(selector: &str) -> PageResult<Vec<Compound>> {
    let invalid = || PageError::InvalidSelector {
        selector: selector.to_string(),
    };

    let mut compounds = Vec::new();
    for part in selector.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid());
        }

        let mut compound = Compound::default();
        let mut chars = part.chars().peekable();

        if chars.peek() == Some(&'*') {
            chars.next();
        } else if chars.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            let mut tag = String::new();
            while let Some(c) = chars.next_if(|c| is_ident_char(*c)) {
                tag.push(c);
            }
            compound.tag = Some(tag);
        }

        while let Some(prefix) = chars.next() {
            let mut name = String::new();
            while let Some(c) = chars.next_if(|c| is_ident_char(*c)) {
                name.push(c);
            }
            if name.is_empty() {
                return Err(invalid());
            }
            match prefix {
                '#' => compound.ids.push(name),
                '.' => compound.classes.push(name),
                _ => return Err(invalid()),
            }
        }

        compounds.push(compound);
    }

    Ok(compounds)
}

/// In-memory [`Page`] implementation
pub struct SimulatedPage {
    state: ParkingMutex<PageState>,
}

impl Default for SimulatedPage {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

impl SimulatedPage {
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            state: ParkingMutex::new(PageState {
                viewport: (viewport_width, viewport_height),
                scroll: (0.0, 0.0),
                visibility: VisibilityState::Visible,
                pending_scroll: false,
                now: Duration::ZERO,
                next_handle: 0,
                nodes: Vec::new(),
                intervals: BTreeMap::new(),
                timeouts: BTreeMap::new(),
                listeners: BTreeMap::new(),
                observers: BTreeMap::new(),
                clicks: Vec::new(),
                released: Vec::new(),
            }),
        }
    }

    /// Append an element to the body, after every existing node
    pub fn add_element(&self, spec: ElementSpec) -> ElementRef {
        let mut state = self.state.lock();
        let element = ElementRef(state.nodes.len() as u64);
        state.nodes.push(Node {
            tag: spec.tag,
            dom_id: spec.id,
            classes: spec.classes,
            rect: spec.rect,
            styles: HashMap::new(),
            text: String::new(),
            mount: Some(Mount::Body),
            cancels_clicks: spec.cancels_clicks,
        });
        element
    }

    /// Detach an element the way page script would
    pub fn detach(&self, element: ElementRef) {
        if let Some(node) = self.state.lock().nodes.get_mut(element.0 as usize) {
            node.mount = None;
        }
    }

    /// Move an element in document coordinates without firing scroll or
    /// resize events (an animation or layout shift)
    pub fn set_element_rect(&self, element: ElementRef, rect: Rect) {
        if let Some(node) = self.state.lock().nodes.get_mut(element.0 as usize) {
            node.rect = rect;
        }
        self.flush_intersections();
    }

    /// Run timers and timeouts due within `by`, in due order
    pub fn advance(&self, by: Duration) {
        let pending_scroll = std::mem::take(&mut self.state.lock().pending_scroll);
        if pending_scroll {
            self.fire(PageEvent::Scroll);
        }
        self.flush_intersections();

        let target = self.state.lock().now + by;
        loop {
            let next = {
                let mut state = self.state.lock();
                let interval = state
                    .intervals
                    .iter()
                    .map(|(id, interval)| (interval.next_due, *id))
                    .min();
                let timeout = state
                    .timeouts
                    .iter()
                    .map(|(id, timeout)| (timeout.due, *id))
                    .min();

                match (interval, timeout) {
                    (Some((due, id)), t) if due <= target && t.map_or(true, |t| due <= t.0) => {
                        state.now = due;
                        let interval = state.intervals.get_mut(&id);
                        interval.map(|interval| {
                            interval.next_due += interval.period;
                            Fired::Repeating(interval.callback.clone())
                        })
                    }
                    (_, Some((due, id))) if due <= target => {
                        state.now = due;
                        state
                            .timeouts
                            .remove(&id)
                            .map(|timeout| Fired::Once(timeout.callback))
                    }
                    _ => None,
                }
            };

            match next {
                Some(Fired::Repeating(callback)) => callback(),
                Some(Fired::Once(callback)) => callback(),
                None => break,
            }
        }

        self.state.lock().now = target;
        self.flush_intersections();
    }

    /// Scroll the window and fire scroll listeners
    pub fn scroll_to(&self, x: f64, y: f64) {
        {
            let mut state = self.state.lock();
            state.scroll = (x.max(0.0), y.max(0.0));
            state.pending_scroll = false;
        }
        self.fire(PageEvent::Scroll);
        self.flush_intersections();
    }

    /// Resize the viewport and fire resize listeners
    pub fn resize(&self, width: f64, height: f64) {
        self.state.lock().viewport = (width, height);
        self.fire(PageEvent::Resize);
        self.flush_intersections();
    }

    /// Change document visibility; listeners fire only on an actual change
    pub fn set_visibility(&self, visibility: VisibilityState) {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.visibility != visibility;
            state.visibility = visibility;
            changed
        };
        if changed {
            self.fire(PageEvent::VisibilityChange);
        }
    }

    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    pub fn scroll_offset(&self) -> (f64, f64) {
        self.state.lock().scroll
    }

    pub fn active_timers(&self) -> usize {
        self.state.lock().intervals.len()
    }

    pub fn pending_timeouts(&self) -> usize {
        self.state.lock().timeouts.len()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn listeners_for(&self, event: PageEvent) -> usize {
        self.state.lock().listeners_for(event).len()
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    pub fn clicks(&self) -> Vec<DispatchedClick> {
        self.state.lock().clicks.clone()
    }

    /// Element handles the caller has said it no longer needs, in order
    pub fn released_elements(&self) -> Vec<ElementRef> {
        self.state.lock().released.clone()
    }

    /// Number of attached nodes carrying `dom_id`
    pub fn count_by_id(&self, dom_id: &str) -> usize {
        self.state
            .lock()
            .nodes
            .iter()
            .filter(|node| node.mount.is_some() && node.dom_id.as_deref() == Some(dom_id))
            .count()
    }

    /// Inline style of the attached node carrying `dom_id`
    pub fn style_of(&self, dom_id: &str, property: &str) -> Option<String> {
        let element = self.node_by_id(dom_id)?;
        self.style(element, property).ok().flatten()
    }

    /// Text content of the attached node carrying `dom_id`
    pub fn text_of(&self, dom_id: &str) -> Option<String> {
        let element = self.node_by_id(dom_id)?;
        let state = self.state.lock();
        state.node(element).ok().map(|node| node.text.clone())
    }

    fn fire(&self, event: PageEvent) {
        let callbacks = self.state.lock().listeners_for(event);
        for callback in callbacks {
            callback();
        }
    }

    fn flush_intersections(&self) {
        let due: Vec<(IntersectionCallback, bool)> = {
            let mut state = self.state.lock();
            let samples: Vec<(u64, bool)> = state
                .observers
                .iter()
                .map(|(id, observer)| {
                    let ratio = state.intersection_ratio(observer.element);
                    (*id, ratio > 0.0 && ratio >= observer.threshold)
                })
                .collect();

            samples
                .into_iter()
                .filter_map(|(id, intersecting)| {
                    let observer = state.observers.get_mut(&id)?;
                    if observer.last == Some(intersecting) {
                        return None;
                    }
                    observer.last = Some(intersecting);
                    Some((observer.callback.clone(), intersecting))
                })
                .collect()
        };

        for (callback, intersecting) in due {
            callback(intersecting);
        }
    }
}

enum Fired {
    Repeating(Callback),
    Once(OnceCallback),
}

impl Page for SimulatedPage {
    fn query_selector(&self, selector: &str) -> PageResult<Option<ElementRef>> {
        let compounds = parse_selector(selector)?;
        let state = self.state.lock();
        Ok(state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.mount.is_some())
            .find(|(_, node)| compounds.iter().any(|c| c.matches(node)))
            .map(|(index, _)| ElementRef(index as u64)))
    }

    fn bounding_rect(&self, element: ElementRef) -> PageResult<Rect> {
        let state = self.state.lock();
        let node = state.node(element)?;
        Ok(state.viewport_rect(node))
    }

    fn describe(&self, element: ElementRef) -> PageResult<ElementSummary> {
        let state = self.state.lock();
        let node = state.node(element)?;
        Ok(ElementSummary {
            tag: node.tag.clone(),
            id: node.dom_id.clone(),
        })
    }

    fn scroll_into_view(&self, element: ElementRef) -> PageResult<()> {
        let mut state = self.state.lock();
        let rect = state.node(element)?.rect;
        let (center_x, center_y) = rect.center();
        let x = (center_x - state.viewport.0 / 2.0).max(0.0);
        let y = (center_y - state.viewport.1 / 2.0).max(0.0);
        if (x, y) != state.scroll {
            state.scroll = (x, y);
            state.pending_scroll = true;
        }
        Ok(())
    }

    fn dispatch_click(&self, element: ElementRef, x: f64, y: f64) -> PageResult<bool> {
        let mut state = self.state.lock();
        let cancels = state.node(element)?.cancels_clicks;
        state.clicks.push(DispatchedClick { element, x, y });
        Ok(!cancels)
    }

    fn node_by_id(&self, dom_id: &str) -> Option<ElementRef> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .position(|node| node.mount.is_some() && node.dom_id.as_deref() == Some(dom_id))
            .map(|index| ElementRef(index as u64))
    }

    fn create_node(&self, tag: &str, dom_id: &str, mount: Mount) -> PageResult<ElementRef> {
        let mut state = self.state.lock();
        let element = ElementRef(state.nodes.len() as u64);
        state.nodes.push(Node {
            tag: tag.to_uppercase(),
            dom_id: Some(dom_id.to_string()),
            classes: Vec::new(),
            rect: Rect::default(),
            styles: HashMap::new(),
            text: String::new(),
            mount: Some(mount),
            cancels_clicks: false,
        });
        Ok(element)
    }

    fn set_style(&self, element: ElementRef, property: &str, value: &str) -> PageResult<()> {
        let mut state = self.state.lock();
        state
            .node_mut(element)?
            .styles
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn style(&self, element: ElementRef, property: &str) -> PageResult<Option<String>> {
        let state = self.state.lock();
        Ok(state.node(element)?.styles.get(property).cloned())
    }

    fn set_text(&self, element: ElementRef, text: &str) -> PageResult<()> {
        let mut state = self.state.lock();
        state.node_mut(element)?.text = text.to_string();
        Ok(())
    }

    fn remove_node(&self, element: ElementRef) -> PageResult<()> {
        if let Some(node) = self.state.lock().nodes.get_mut(element.0 as usize) {
            node.mount = None;
        }
        Ok(())
    }

    fn is_attached(&self, element: ElementRef) -> bool {
        self.state.lock().node(element).is_ok()
    }

    fn offset_size(&self, element: ElementRef) -> PageResult<(f64, f64)> {
        let state = self.state.lock();
        let node = state.node(element)?;
        if node.styles.get("display").map(String::as_str) == Some("none") {
            return Ok((0.0, 0.0));
        }
        if node.styles.contains_key("width") || node.styles.contains_key("height") {
            return Ok((px(node.styles.get("width")), px(node.styles.get("height"))));
        }
        Ok((node.rect.width, node.rect.height))
    }

    fn set_interval(&self, period: Duration, callback: Callback) -> PageResult<TimerId> {
        let mut state = self.state.lock();
        let period = period.max(Duration::from_millis(1));
        let id = state.handle();
        let next_due = state.now + period;
        state.intervals.insert(
            id,
            Interval {
                period,
                next_due,
                callback,
            },
        );
        Ok(TimerId(id))
    }

    fn clear_interval(&self, timer: TimerId) {
        self.state.lock().intervals.remove(&timer.0);
    }

    fn set_timeout(&self, delay: Duration, callback: OnceCallback) -> PageResult<()> {
        let mut state = self.state.lock();
        let id = state.handle();
        let due = state.now + delay;
        state.timeouts.insert(id, Timeout { due, callback });
        Ok(())
    }

    fn add_listener(&self, event: PageEvent, callback: Callback) -> PageResult<ListenerId> {
        let mut state = self.state.lock();
        let id = state.handle();
        state.listeners.insert(id, (event, callback));
        Ok(ListenerId(id))
    }

    fn remove_listener(&self, listener: ListenerId) {
        self.state.lock().listeners.remove(&listener.0);
    }

    fn observe_intersection(
        &self,
        element: ElementRef,
        threshold: f64,
        callback: IntersectionCallback,
    ) -> PageResult<ObserverId> {
        let mut state = self.state.lock();
        state.node(element)?;
        let id = state.handle();
        state.observers.insert(
            id,
            Observer {
                element,
                threshold,
                last: None,
                callback,
            },
        );
        Ok(ObserverId(id))
    }

    fn disconnect_observer(&self, observer: ObserverId) {
        self.state.lock().observers.remove(&observer.0);
    }

    fn release_element(&self, element: ElementRef) {
        self.state.lock().released.push(element);
    }

    fn visibility_state(&self) -> VisibilityState {
        self.state.lock().visibility
    }
}
