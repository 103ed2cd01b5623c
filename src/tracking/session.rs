//! Tracking session state
//!
//! The handles of a live session sit inside the `Tracking` variant, so an idle
//! tracker cannot hold a stray timer or listener, and a tracking one cannot be
//! missing any.

use crate::page::{ElementRef, ListenerId, ObserverId, Page, TimerId};

/// Every host registration a live session owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingHandles {
    pub timer: TimerId,
    pub observer: ObserverId,
    pub scroll: ListenerId,
    pub resize: ListenerId,
    pub visibility: ListenerId,
}

impl TrackingHandles {
    /// Cancel the timer, drop the listeners and disconnect the observer
    pub fn release(self, page: &dyn Page) {
        page.clear_interval(self.timer);
        page.remove_listener(self.scroll);
        page.remove_listener(self.resize);
        page.remove_listener(self.visibility);
        page.disconnect_observer(self.observer);
    }
}

/// The element being followed, with its last intersection sample
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
    pub element: ElementRef,
    pub selector: String,
    pub visible: bool,
    pub handles: TrackingHandles,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackingState {
    #[default]
    Idle,
    Tracking(TrackedTarget),
}

#[derive(Debug, Default)]
pub struct Session {
    pub state: TrackingState,
    /// Bumped on every new session; callbacks carry the value they were
    /// registered under and ignore themselves once it moves on
    pub generation: u64,
}

impl Session {
    pub fn target(&self) -> Option<&TrackedTarget> {
        match &self.state {
            TrackingState::Idle => None,
            TrackingState::Tracking(target) => Some(target),
        }
    }

    pub fn target_mut(&mut self) -> Option<&mut TrackedTarget> {
        match &mut self.state {
            TrackingState::Idle => None,
            TrackingState::Tracking(target) => Some(target),
        }
    }

    /// The live target, only if it belongs to `generation`
    pub fn current(&self, generation: u64) -> Option<&TrackedTarget> {
        self.target().filter(|_| self.generation == generation)
    }

    pub fn current_mut(&mut self, generation: u64) -> Option<&mut TrackedTarget> {
        if self.generation != generation {
            return None;
        }
        self.target_mut()
    }

    /// Release every handle, the target's included, and return to Idle.
    /// Safe to call when idle.
    pub fn clear(&mut self, page: &dyn Page) -> Option<TrackedTarget> {
        match std::mem::take(&mut self.state) {
            TrackingState::Idle => None,
            TrackingState::Tracking(target) => {
                target.handles.release(page);
                page.release_element(target.element);
                Some(target)
            }
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, TrackingState::Tracking(_))
    }
}
