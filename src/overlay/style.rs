//! Inline styles for the overlay nodes

use crate::config::TrackerConfig;

pub const GREEN: &str = "#2ecc71";
pub const GREEN_FILL: &str = "rgba(46, 204, 113, 0.5)";
pub const RED: &str = "#e74c3c";
pub const RED_FILL: &str = "rgba(231, 76, 60, 0.5)";

/// Marker sits above the frame, which sits above most page content
pub const MARKER_Z_INDEX: &str = "9999";
pub const FRAME_Z_INDEX: &str = "9998";

pub const FRAME_ANIMATION: &str = "extension-boundary-pulse";

pub type StyleList = Vec<(&'static str, String)>;

pub fn marker_styles(config: &TrackerConfig) -> StyleList {
    let size = format!("{}px", config.marker_size_px);
    vec![
        ("position", "fixed".to_string()),
        ("left", "0px".to_string()),
        ("top", "0px".to_string()),
        ("width", size.clone()),
        ("height", size),
        ("border-radius", "50%".to_string()),
        ("background-color", GREEN_FILL.to_string()),
        ("border", format!("2px solid {}", GREEN)),
        ("z-index", MARKER_Z_INDEX.to_string()),
        ("pointer-events", "none".to_string()),
        ("transition", "transform 0.3s ease".to_string()),
        ("display", "none".to_string()),
    ]
}

pub fn frame_styles(config: &TrackerConfig) -> StyleList {
    vec![
        ("position", "fixed".to_string()),
        ("top", "0".to_string()),
        ("left", "0".to_string()),
        ("width", "100%".to_string()),
        ("height", "100%".to_string()),
        ("border", format!("{}px solid {}", config.frame_border_px, GREEN)),
        ("box-sizing", "border-box".to_string()),
        ("pointer-events", "none".to_string()),
        ("z-index", FRAME_Z_INDEX.to_string()),
        (
            "animation",
            format!("{} {}s infinite", FRAME_ANIMATION, config.frame_pulse_period_s),
        ),
    ]
}

pub fn frame_keyframes() -> String {
    format!(
        "@keyframes {name} {{\n  0% {{ border-color: rgba(46, 204, 113, 0.8); }}\n  50% {{ border-color: rgba(46, 204, 113, 0.4); }}\n  100% {{ border-color: rgba(46, 204, 113, 0.8); }}\n}}\n",
        name = FRAME_ANIMATION
    )
}
