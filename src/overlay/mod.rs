//! Overlay renderer
//!
//! Owns the two visual artifacts drawn on top of the page: the cursor marker
//! and the boundary frame (with its keyframes style node). The renderer keeps
//! its own record of the nodes it holds; nodes left behind by an earlier
//! installation are adopted by id instead of being duplicated.

pub mod style;

use crate::config::TrackerConfig;
use crate::page::{ElementRef, Mount, Page, PageResult};
use parking_lot::Mutex as ParkingMutex;

pub const MARKER_ID: &str = "virtual-cursor-extension";
pub const FRAME_ID: &str = "extension-boundary-overlay";
pub const FRAME_STYLE_ID: &str = "extension-boundary-style";

/// Outcome of [`OverlayRenderer::ensure_boundary_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Created,
    AlreadyExisted,
}

impl FrameStatus {
    pub fn message(&self) -> &'static str {
        match self {
            FrameStatus::Created => "Boundary overlay created",
            FrameStatus::AlreadyExisted => "Boundary overlay already exists",
        }
    }
}

/// Marker colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTint {
    Idle,
    Clicked,
}

#[derive(Default)]
struct OverlayNodes {
    marker: Option<ElementRef>,
    frame: Option<ElementRef>,
    frame_style: Option<ElementRef>,
}

pub struct OverlayRenderer {
    config: TrackerConfig,
    nodes: ParkingMutex<OverlayNodes>,
}

impl OverlayRenderer {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            nodes: ParkingMutex::new(OverlayNodes::default()),
        }
    }

    /// Create the marker if needed and return it
    pub fn ensure_cursor_marker(&self, page: &dyn Page) -> PageResult<ElementRef> {
        let mut nodes = self.nodes.lock();
        if let Some(marker) = nodes.marker.filter(|m| page.is_attached(*m)) {
            return Ok(marker);
        }

        let marker = match page.node_by_id(MARKER_ID) {
            Some(existing) => {
                tracing::debug!("Adopting existing cursor marker");
                existing
            }
            None => {
                let marker = page.create_node("div", MARKER_ID, Mount::Body)?;
                for (property, value) in style::marker_styles(&self.config) {
                    page.set_style(marker, property, &value)?;
                }
                tracing::debug!("Created cursor marker");
                marker
            }
        };

        nodes.marker = Some(marker);
        Ok(marker)
    }

    /// The marker, if one is currently attached
    pub fn marker(&self, page: &dyn Page) -> Option<ElementRef> {
        self.nodes.lock().marker.filter(|m| page.is_attached(*m))
    }

    /// Create the boundary frame, or show it again if it already exists
    pub fn ensure_boundary_frame(&self, page: &dyn Page) -> PageResult<FrameStatus> {
        let mut nodes = self.nodes.lock();

        let existing = nodes
            .frame
            .filter(|f| page.is_attached(*f))
            .or_else(|| page.node_by_id(FRAME_ID));

        if let Some(frame) = existing {
            nodes.frame = Some(frame);
            if page.style(frame, "display")?.as_deref() == Some("none") {
                page.set_style(frame, "display", "block")?;
            }
            return Ok(FrameStatus::AlreadyExisted);
        }

        // The keyframes node can outlive a frame removed by page script
        let keyframes = match nodes
            .frame_style
            .filter(|s| page.is_attached(*s))
            .or_else(|| page.node_by_id(FRAME_STYLE_ID))
        {
            Some(existing) => existing,
            None => {
                let keyframes = page.create_node("style", FRAME_STYLE_ID, Mount::Head)?;
                page.set_text(keyframes, &style::frame_keyframes())?;
                keyframes
            }
        };
        nodes.frame_style = Some(keyframes);

        let frame = page.create_node("div", FRAME_ID, Mount::Body)?;
        for (property, value) in style::frame_styles(&self.config) {
            page.set_style(frame, property, &value)?;
        }
        nodes.frame = Some(frame);

        tracing::debug!("Created boundary frame");
        Ok(FrameStatus::Created)
    }

    /// Remove the frame and its keyframes node; absent nodes are fine
    pub fn remove_boundary_frame(&self, page: &dyn Page) -> PageResult<()> {
        let mut nodes = self.nodes.lock();

        let frame = nodes.frame.take().or_else(|| page.node_by_id(FRAME_ID));
        if let Some(frame) = frame {
            page.remove_node(frame)?;
        }

        let keyframes = nodes
            .frame_style
            .take()
            .or_else(|| page.node_by_id(FRAME_STYLE_ID));
        if let Some(keyframes) = keyframes {
            page.remove_node(keyframes)?;
        }

        Ok(())
    }

    /// Remove the marker node from the page entirely
    pub fn remove_cursor_marker(&self, page: &dyn Page) -> PageResult<()> {
        let mut nodes = self.nodes.lock();
        let marker = nodes.marker.take().or_else(|| page.node_by_id(MARKER_ID));
        if let Some(marker) = marker {
            page.remove_node(marker)?;
        }
        Ok(())
    }

    pub fn move_marker(&self, page: &dyn Page, left: f64, top: f64) -> PageResult<()> {
        let Some(marker) = self.marker(page) else {
            return Ok(());
        };
        page.set_style(marker, "left", &format!("{}px", left))?;
        page.set_style(marker, "top", &format!("{}px", top))
    }

    pub fn set_marker_visible(&self, page: &dyn Page, visible: bool) -> PageResult<()> {
        let Some(marker) = self.marker(page) else {
            return Ok(());
        };
        page.set_style(marker, "display", if visible { "block" } else { "none" })
    }

    pub fn set_marker_scale(&self, page: &dyn Page, scale: f64) -> PageResult<()> {
        let Some(marker) = self.marker(page) else {
            return Ok(());
        };
        page.set_style(marker, "transform", &format!("scale({})", scale))
    }

    pub fn tint_marker(&self, page: &dyn Page, tint: MarkerTint) -> PageResult<()> {
        let Some(marker) = self.marker(page) else {
            return Ok(());
        };
        let (fill, border) = match tint {
            MarkerTint::Idle => (style::GREEN_FILL, style::GREEN),
            MarkerTint::Clicked => (style::RED_FILL, style::RED),
        };
        page.set_style(marker, "background-color", fill)?;
        page.set_style(marker, "border-color", border)
    }

    /// Rendered marker size; a hidden marker reports its configured size
    pub fn marker_size(&self, page: &dyn Page, marker: ElementRef) -> PageResult<(f64, f64)> {
        let (width, height) = page.offset_size(marker)?;
        if width > 0.0 && height > 0.0 {
            Ok((width, height))
        } else {
            Ok((self.config.marker_size_px, self.config.marker_size_px))
        }
    }
}
