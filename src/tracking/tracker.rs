//! Element tracker
//!
//! Follows a single page element with the cursor marker. A successful
//! `locate` registers an intersection observer, a reconciliation timer, and
//! scroll/resize/visibility listeners; `hide`, `cleanup` and any later
//! `locate` release all of them before returning.
//!
//! Host callbacks hold a weak reference to the tracker plus the session
//! generation they were registered under, so a callback that outlives its
//! session does nothing.

use crate::config::{ConfigError, TrackerConfig};
use crate::overlay::{MarkerTint, OverlayRenderer};
use crate::page::{
    Callback, ElementRef, ElementSummary, ListenerId, ObserverId, Page, PageEvent, PageResult,
    TimerId, VisibilityState,
};
use crate::tracking::error::{Operation, TrackingError, TrackingResult};
use crate::tracking::session::{Session, TrackedTarget, TrackingHandles, TrackingState};
use parking_lot::Mutex as ParkingMutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Snapshot of the tracker for callers and tests
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStatus {
    pub tracking: bool,
    pub visible: bool,
    pub element: Option<ElementRef>,
    pub selector: Option<String>,
}

struct Shared {
    page: Arc<dyn Page>,
    overlay: OverlayRenderer,
    config: TrackerConfig,
    session: ParkingMutex<Session>,
    /// Latest intersection sample that arrived while the session was busy
    pending_sample: ParkingMutex<Option<(u64, bool)>>,
}

/// Registrations made so far while starting a session
#[derive(Default)]
struct Partial {
    timer: Option<TimerId>,
    observer: Option<ObserverId>,
    listeners: Vec<ListenerId>,
}

impl Partial {
    fn rollback(self, page: &dyn Page) {
        if let Some(timer) = self.timer {
            page.clear_interval(timer);
        }
        if let Some(observer) = self.observer {
            page.disconnect_observer(observer);
        }
        for listener in self.listeners {
            page.remove_listener(listener);
        }
    }
}

/// Controller owning the tracked-target slot
#[derive(Clone)]
pub struct Tracker {
    shared: Arc<Shared>,
}

impl Tracker {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self::build(page, TrackerConfig::default())
    }

    /// Tracker with a custom configuration, rejected if it does not validate
    pub fn with_config(
        page: Arc<dyn Page>,
        config: TrackerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(page, config))
    }

    fn build(page: Arc<dyn Page>, config: TrackerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                overlay: OverlayRenderer::new(config.clone()),
                page,
                config,
                session: ParkingMutex::new(Session::default()),
                pending_sample: ParkingMutex::new(None),
            }),
        }
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.shared.overlay
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    pub fn status(&self) -> TrackerStatus {
        let session = self.shared.session.lock();
        match session.target() {
            Some(target) => TrackerStatus {
                tracking: true,
                visible: target.visible,
                element: Some(target.element),
                selector: Some(target.selector.clone()),
            },
            None => TrackerStatus {
                tracking: false,
                visible: false,
                element: None,
                selector: None,
            },
        }
    }

    /// Start following the first element matching `selector`.
    ///
    /// Any previous session is torn down first. On failure the tracker is
    /// left idle with no overlay on the page.
    pub fn locate(&self, selector: &str) -> TrackingResult<ElementSummary> {
        let shared = &self.shared;
        let page = shared.page.as_ref();
        let mut session = shared.session.lock();

        if let Some(previous) = session.clear(page) {
            tracing::debug!("Superseding tracking session for {}", previous.selector);
        }
        if let Err(e) = shared.overlay.set_marker_visible(page, false) {
            tracing::warn!("Failed to hide marker before locate: {}", e);
        }

        let element = match page.query_selector(selector) {
            Ok(Some(element)) => element,
            Ok(None) => {
                shared.discard(&mut session);
                tracing::info!("No element matches {}", selector);
                return Err(TrackingError::NotFound(selector.to_string()));
            }
            Err(e) => {
                shared.discard(&mut session);
                return Err(TrackingError::internal(Operation::Locate, e));
            }
        };

        match Self::begin(shared, &mut session, selector, element) {
            Ok(summary) => {
                tracing::info!(
                    "Tracking {} (generation={})",
                    summary,
                    session.generation
                );
                Ok(summary)
            }
            Err(e) => {
                shared.discard(&mut session);
                Err(TrackingError::internal(Operation::Locate, e))
            }
        }
    }

    /// Dispatch a synthetic click at the centre of the tracked element
    pub fn click(&self) -> TrackingResult<ElementSummary> {
        let shared = &self.shared;

        // Page handlers run synchronously inside dispatch, so the session
        // lock is not held across it.
        let element = {
            let session = shared.session.lock();
            session
                .target()
                .map(|target| target.element)
                .ok_or(TrackingError::NoTarget)?
        };

        Self::flash(shared);

        let (delivered, summary) = shared
            .click_element(element)
            .map_err(|e| TrackingError::internal(Operation::Click, e))?;

        if !delivered {
            tracing::info!("Click on {} was cancelled by the page", summary);
            return Err(TrackingError::ClickCancelled);
        }

        tracing::info!("Clicked {}", summary);
        Ok(summary)
    }

    /// Hide the marker, remove the boundary frame and stop tracking
    pub fn hide(&self) -> TrackingResult<()> {
        let mut session = self.shared.session.lock();
        self.shared
            .teardown(&mut session)
            .map_err(|e| TrackingError::internal(Operation::Hide, e))
    }

    /// Like `hide`, and also remove the marker node from the page
    pub fn cleanup(&self) -> TrackingResult<()> {
        let shared = &self.shared;
        let mut session = shared.session.lock();
        let hidden = shared.teardown(&mut session);
        let removed = shared.overlay.remove_cursor_marker(shared.page.as_ref());
        tracing::debug!("Overlay removed from page");
        hidden
            .and(removed)
            .map_err(|e| TrackingError::internal(Operation::Cleanup, e))
    }

    fn begin(
        shared: &Arc<Shared>,
        session: &mut Session,
        selector: &str,
        element: ElementRef,
    ) -> PageResult<ElementSummary> {
        let page = shared.page.as_ref();

        let frame = shared.overlay.ensure_boundary_frame(page)?;
        tracing::debug!("{}", frame.message());
        shared.overlay.ensure_cursor_marker(page)?;

        session.generation += 1;
        let generation = session.generation;

        let mut partial = Partial::default();
        let handles = match Self::start_tracking(shared, element, generation, &mut partial) {
            Ok(handles) => handles,
            Err(e) => {
                partial.rollback(page);
                return Err(e);
            }
        };

        session.state = TrackingState::Tracking(TrackedTarget {
            element,
            selector: selector.to_string(),
            visible: true,
            handles,
        });

        shared.sync_position(session)?;
        Self::pulse(shared);
        page.scroll_into_view(element)?;
        page.describe(element)
    }

    fn start_tracking(
        shared: &Arc<Shared>,
        element: ElementRef,
        generation: u64,
        partial: &mut Partial,
    ) -> PageResult<TrackingHandles> {
        let page = shared.page.as_ref();
        let weak = Arc::downgrade(shared);

        let on_intersection = {
            let weak = weak.clone();
            Arc::new(move |visible: bool| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_intersection(generation, visible);
                }
            })
        };
        let observer = page.observe_intersection(
            element,
            shared.config.intersection_threshold,
            on_intersection,
        )?;
        partial.observer = Some(observer);

        let reposition: Callback = {
            let weak = weak.clone();
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_reposition(generation);
                }
            })
        };

        let timer = page.set_interval(shared.config.poll_interval(), reposition.clone())?;
        partial.timer = Some(timer);

        let scroll = page.add_listener(PageEvent::Scroll, reposition.clone())?;
        partial.listeners.push(scroll);
        let resize = page.add_listener(PageEvent::Resize, reposition)?;
        partial.listeners.push(resize);

        let on_visibility: Callback = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_visibility_change(generation);
            }
        });
        let visibility = page.add_listener(PageEvent::VisibilityChange, on_visibility)?;
        partial.listeners.push(visibility);

        tracing::debug!(
            "Tracking started (poll={:?}, threshold={})",
            shared.config.poll_interval(),
            shared.config.intersection_threshold
        );

        Ok(TrackingHandles {
            timer,
            observer,
            scroll,
            resize,
            visibility,
        })
    }

    /// Brief enlarge-then-normal pulse after a successful locate
    fn pulse(shared: &Arc<Shared>) {
        let page = shared.page.as_ref();
        if let Err(e) = shared.overlay.set_marker_scale(page, 1.2) {
            tracing::warn!("Failed to pulse marker: {}", e);
            return;
        }
        Self::after(shared, shared.config.pulse_duration(), |shared| {
            shared.overlay.set_marker_scale(shared.page.as_ref(), 1.0)
        });
    }

    /// Red flash on the marker while a click is dispatched
    fn flash(shared: &Arc<Shared>) {
        let page = shared.page.as_ref();
        let applied = shared
            .overlay
            .set_marker_scale(page, 0.8)
            .and_then(|_| shared.overlay.tint_marker(page, MarkerTint::Clicked));
        if let Err(e) = applied {
            tracing::warn!("Failed to flash marker: {}", e);
            return;
        }
        Self::after(shared, shared.config.click_flash(), |shared| {
            let page = shared.page.as_ref();
            shared.overlay.set_marker_scale(page, 1.0)?;
            shared.overlay.tint_marker(page, MarkerTint::Idle)
        });
    }

    /// Schedule a fire-and-forget cosmetic revert
    fn after(
        shared: &Arc<Shared>,
        delay: Duration,
        revert: impl FnOnce(&Shared) -> PageResult<()> + Send + 'static,
    ) {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let scheduled = shared.page.set_timeout(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    if let Err(e) = revert(&shared) {
                        tracing::warn!("Failed to revert marker effect: {}", e);
                    }
                }
            }),
        );
        if let Err(e) = scheduled {
            tracing::warn!("Failed to schedule marker effect: {}", e);
        }
    }
}

impl Shared {
    /// Move the marker to the target's centre and re-derive its visibility
    fn sync_position(&self, session: &Session) -> PageResult<()> {
        let Some(target) = session.target() else {
            return Ok(());
        };
        let page = self.page.as_ref();

        let rect = page.bounding_rect(target.element)?;
        if rect.is_empty() {
            tracing::trace!("Target has no area, skipping position update");
            return Ok(());
        }

        let Some(marker) = self.overlay.marker(page) else {
            return Ok(());
        };
        let (width, height) = self.overlay.marker_size(page, marker)?;
        let (center_x, center_y) = rect.center();

        self.overlay
            .move_marker(page, center_x - width / 2.0, center_y - height / 2.0)?;
        self.overlay.set_marker_visible(page, target.visible)
    }

    fn on_reposition(&self, generation: u64) {
        let Some(session) = self.session.try_lock() else {
            tracing::trace!("Tracker busy, skipping reposition");
            return;
        };
        if session.current(generation).is_none() {
            return;
        }
        if let Err(e) = self.sync_position(&session) {
            tracing::warn!("Error updating cursor position: {}", e);
        }
    }

    fn on_visibility_change(&self, generation: u64) {
        if self.page.visibility_state() == VisibilityState::Visible {
            self.on_reposition(generation);
        }
    }

    fn on_intersection(self: &Arc<Self>, generation: u64, visible: bool) {
        let Some(mut session) = self.session.try_lock() else {
            // Observers report only threshold crossings; keep the latest
            // sample and apply it once the session is free
            tracing::trace!("Tracker busy, deferring intersection sample");
            let already_queued = self
                .pending_sample
                .lock()
                .replace((generation, visible))
                .is_some();
            if !already_queued {
                self.retry_pending_sample();
            }
            return;
        };
        self.pending_sample.lock().take();

        let Some(target) = session.current_mut(generation) else {
            return;
        };
        target.visible = visible;
        tracing::trace!("Target intersecting={}", visible);

        if let Err(e) = self.overlay.set_marker_visible(self.page.as_ref(), visible) {
            tracing::warn!("Error updating cursor visibility: {}", e);
        }
    }

    fn retry_pending_sample(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let scheduled = self.page.set_timeout(
            Duration::ZERO,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let sample = shared.pending_sample.lock().take();
                if let Some((generation, visible)) = sample {
                    shared.on_intersection(generation, visible);
                }
            }),
        );
        if let Err(e) = scheduled {
            tracing::warn!("Failed to defer intersection sample: {}", e);
        }
    }

    fn click_element(&self, element: ElementRef) -> PageResult<(bool, ElementSummary)> {
        let page = self.page.as_ref();
        let rect = page.bounding_rect(element)?;
        let (x, y) = rect.center();
        let summary = page.describe(element)?;
        let delivered = page.dispatch_click(element, x, y)?;
        Ok((delivered, summary))
    }

    /// Hide the marker, drop the frame, release every handle.
    ///
    /// The session always ends idle; the first overlay error is returned.
    fn teardown(&self, session: &mut Session) -> PageResult<()> {
        let page = self.page.as_ref();
        let hidden = self.overlay.set_marker_visible(page, false);
        let removed = self.overlay.remove_boundary_frame(page);
        if let Some(previous) = session.clear(page) {
            tracing::info!("Stopped tracking {}", previous.selector);
        }
        hidden.and(removed)
    }

    /// Return to a clean idle state after a failed locate
    fn discard(&self, session: &mut Session) {
        if let Err(e) = self.teardown(session) {
            tracing::warn!("Failed to clear overlay after locate error: {}", e);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.session.get_mut().clear(self.page.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{FRAME_ID, MARKER_ID};
    use crate::page::{ElementSpec, PageError, Rect, SimulatedPage};

    fn setup() -> (Arc<SimulatedPage>, Tracker, ElementRef) {
        let page = Arc::new(SimulatedPage::new(800.0, 600.0));
        let button = page.add_element(
            ElementSpec::new("button")
                .id("submit-btn")
                .rect(Rect::new(100.0, 200.0, 80.0, 40.0)),
        );
        let tracker = Tracker::new(page.clone());
        (page, tracker, button)
    }

    fn marker_origin(page: &SimulatedPage) -> (String, String) {
        (
            page.style_of(MARKER_ID, "left").unwrap_or_default(),
            page.style_of(MARKER_ID, "top").unwrap_or_default(),
        )
    }

    #[test]
    fn test_locate_registers_full_handle_set() {
        let (page, tracker, button) = setup();
        let summary = tracker.locate("#submit-btn").unwrap();

        assert_eq!(summary.to_string(), "button#submit-btn");
        assert_eq!(page.active_timers(), 1);
        assert_eq!(page.listeners_for(PageEvent::Scroll), 1);
        assert_eq!(page.listeners_for(PageEvent::Resize), 1);
        assert_eq!(page.listeners_for(PageEvent::VisibilityChange), 1);
        assert_eq!(page.observer_count(), 1);

        let status = tracker.status();
        assert!(status.tracking);
        assert_eq!(status.element, Some(button));
        assert_eq!(status.selector.as_deref(), Some("#submit-btn"));
    }

    #[test]
    fn test_initial_sync_centres_marker() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();

        // centre (140, 220) minus half the 20px marker
        assert_eq!(marker_origin(&page), ("130px".to_string(), "210px".to_string()));
        assert_eq!(page.style_of(MARKER_ID, "display").as_deref(), Some("block"));
    }

    #[test]
    fn test_superseding_locate_leaves_one_session() {
        let (page, tracker, _) = setup();
        page.add_element(ElementSpec::new("a").id("link").rect(Rect::new(0.0, 0.0, 50.0, 20.0)));

        tracker.locate("#submit-btn").unwrap();
        tracker.locate("#link").unwrap();
        tracker.locate("#submit-btn").unwrap();

        assert_eq!(page.active_timers(), 1);
        assert_eq!(page.listener_count(), 3);
        assert_eq!(page.observer_count(), 1);
        assert_eq!(page.count_by_id(MARKER_ID), 1);
        assert_eq!(page.count_by_id(FRAME_ID), 1);
    }

    #[test]
    fn test_failed_locate_returns_to_clean_idle() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();

        let err = tracker.locate(".missing-class").unwrap_err();
        assert_eq!(err, TrackingError::NotFound(".missing-class".to_string()));

        assert!(!tracker.status().tracking);
        assert_eq!(page.active_timers(), 0);
        assert_eq!(page.listener_count(), 0);
        assert_eq!(page.observer_count(), 0);
        assert_eq!(page.count_by_id(FRAME_ID), 0);
        assert_eq!(page.style_of(MARKER_ID, "display").as_deref(), Some("none"));
    }

    #[test]
    fn test_invalid_selector_is_internal_fault() {
        let (page, tracker, _) = setup();
        let err = tracker.locate("div > p").unwrap_err();
        assert!(matches!(
            err,
            TrackingError::Internal {
                operation: Operation::Locate,
                source: PageError::InvalidSelector { .. }
            }
        ));
        assert!(err.to_string().starts_with("Error: "));
        assert_eq!(page.active_timers(), 0);
    }

    #[test]
    fn test_polling_follows_silent_layout_changes() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::ZERO);

        page.set_element_rect(button, Rect::new(300.0, 100.0, 80.0, 40.0));
        assert_eq!(marker_origin(&page).0, "130px");

        page.advance(Duration::from_millis(100));
        assert_eq!(marker_origin(&page), ("330px".to_string(), "110px".to_string()));
    }

    #[test]
    fn test_scroll_listener_updates_immediately() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::ZERO);

        page.scroll_to(0.0, 50.0);
        assert_eq!(marker_origin(&page).1, "160px");
    }

    #[test]
    fn test_zero_sized_target_skips_tick() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        let before = marker_origin(&page);

        page.set_element_rect(button, Rect::new(500.0, 500.0, 0.0, 0.0));
        page.advance(Duration::from_millis(300));
        assert_eq!(marker_origin(&page), before);
    }

    #[test]
    fn test_visibility_change_resyncs_when_visible() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::ZERO);

        page.set_visibility(VisibilityState::Hidden);
        page.set_element_rect(button, Rect::new(200.0, 200.0, 80.0, 40.0));
        page.set_visibility(VisibilityState::Visible);
        assert_eq!(marker_origin(&page).0, "230px");
    }

    #[test]
    fn test_visibility_change_to_hidden_does_not_resync() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::ZERO);

        page.set_element_rect(button, Rect::new(200.0, 200.0, 80.0, 40.0));
        page.set_visibility(VisibilityState::Hidden);
        assert_eq!(marker_origin(&page).0, "130px");
    }

    #[test]
    fn test_resize_listener_updates_immediately() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::ZERO);

        page.set_element_rect(button, Rect::new(400.0, 100.0, 80.0, 40.0));
        assert_eq!(marker_origin(&page).0, "130px");

        page.resize(1024.0, 768.0);
        assert_eq!(marker_origin(&page), ("430px".to_string(), "110px".to_string()));
    }

    #[test]
    fn test_intersection_sample_applied_after_busy_session() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::ZERO);
        let generation = tracker.shared.session.lock().generation;

        {
            let _busy = tracker.shared.session.lock();
            tracker.shared.on_intersection(generation, true);
            tracker.shared.on_intersection(generation, false);
        }
        assert!(tracker.status().visible, "sample applied while locked");

        page.advance(Duration::ZERO);
        assert!(!tracker.status().visible, "latest sample was lost");
        assert_eq!(page.style_of(MARKER_ID, "display").as_deref(), Some("none"));
        assert_eq!(page.pending_timeouts(), 1, "only the pulse revert should remain");
    }

    #[test]
    fn test_intersection_drives_marker_visibility() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::ZERO);
        assert!(tracker.status().visible);

        page.scroll_to(0.0, 2000.0);
        assert!(!tracker.status().visible);
        assert_eq!(page.style_of(MARKER_ID, "display").as_deref(), Some("none"));
        assert_eq!(page.count_by_id(FRAME_ID), 1);

        page.scroll_to(0.0, 0.0);
        assert!(tracker.status().visible);
        assert_eq!(page.style_of(MARKER_ID, "display").as_deref(), Some("block"));
    }

    #[test]
    fn test_no_ghost_updates_after_hide() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        tracker.hide().unwrap();
        let before = marker_origin(&page);

        page.set_element_rect(button, Rect::new(600.0, 400.0, 80.0, 40.0));
        page.scroll_to(0.0, 10.0);
        page.advance(Duration::from_secs(1));

        assert_eq!(marker_origin(&page), before);
        assert_eq!(page.style_of(MARKER_ID, "display").as_deref(), Some("none"));
    }

    #[test]
    fn test_pulse_reverts_after_duration() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();
        assert_eq!(page.style_of(MARKER_ID, "transform").as_deref(), Some("scale(1.2)"));

        page.advance(Duration::from_millis(300));
        assert_eq!(page.style_of(MARKER_ID, "transform").as_deref(), Some("scale(1)"));
    }

    #[test]
    fn test_click_flash_reverts() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.advance(Duration::from_millis(300));

        tracker.click().unwrap();
        assert_eq!(
            page.style_of(MARKER_ID, "background-color").as_deref(),
            Some("rgba(231, 76, 60, 0.5)")
        );

        page.advance(Duration::from_millis(200));
        assert_eq!(
            page.style_of(MARKER_ID, "background-color").as_deref(),
            Some("rgba(46, 204, 113, 0.5)")
        );
        assert_eq!(page.style_of(MARKER_ID, "border-color").as_deref(), Some("#2ecc71"));
    }

    #[test]
    fn test_click_targets_element_centre() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        tracker.click().unwrap();

        let clicks = page.clicks();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].element, button);
        assert_eq!((clicks[0].x, clicks[0].y), (140.0, 220.0));
    }

    #[test]
    fn test_click_on_detached_target_is_internal_fault() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.detach(button);

        let err = tracker.click().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error clicking element: Target element is no longer part of the document"
        );
    }

    #[test]
    fn test_detached_target_does_not_break_ticks() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        page.detach(button);

        page.advance(Duration::from_millis(500));
        assert!(tracker.status().tracking);
        assert!(tracker.hide().is_ok());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();

        tracker.cleanup().unwrap();
        tracker.cleanup().unwrap();

        assert_eq!(page.count_by_id(MARKER_ID), 0);
        assert_eq!(page.count_by_id(FRAME_ID), 0);
        assert_eq!(page.active_timers(), 0);
        assert_eq!(page.listener_count(), 0);
    }

    #[test]
    fn test_dropping_tracker_releases_handles() {
        let (page, tracker, _) = setup();
        tracker.locate("#submit-btn").unwrap();
        drop(tracker);

        assert_eq!(page.active_timers(), 0);
        assert_eq!(page.listener_count(), 0);
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn test_with_config_rejects_invalid_config() {
        let page = Arc::new(SimulatedPage::default());
        let config = TrackerConfig {
            intersection_threshold: 5.0,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            Tracker::with_config(page.clone(), config),
            Err(ConfigError::Invalid(_))
        ));

        let config = TrackerConfig {
            poll_interval_ms: 250,
            ..TrackerConfig::default()
        };
        let tracker = Tracker::with_config(page, config).unwrap();
        assert_eq!(tracker.config().poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_target_handle_released_with_session() {
        let (page, tracker, button) = setup();
        tracker.locate("#submit-btn").unwrap();
        assert!(page.released_elements().is_empty());

        tracker.locate("#submit-btn").unwrap();
        assert_eq!(page.released_elements(), vec![button]);

        tracker.hide().unwrap();
        assert_eq!(page.released_elements(), vec![button, button]);
    }

    #[test]
    fn test_independent_trackers_on_separate_pages() {
        let (page_a, tracker_a, _) = setup();
        let (page_b, tracker_b, _) = setup();

        tracker_a.locate("#submit-btn").unwrap();
        assert!(!tracker_b.status().tracking);
        assert_eq!(page_b.active_timers(), 0);

        tracker_b.locate("#submit-btn").unwrap();
        tracker_a.hide().unwrap();
        assert_eq!(page_a.active_timers(), 0);
        assert_eq!(page_b.active_timers(), 1);
    }
}
