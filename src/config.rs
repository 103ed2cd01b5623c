//! Tracker configuration
//!
//! Timing and geometry knobs for the tracking loop and the overlay. Every
//! field has a default, so a partial JSON object (or none at all) is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors produced while loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Period of the position reconciliation timer
    pub poll_interval_ms: u32,
    /// Fraction of the target that must be on screen for the marker to show
    pub intersection_threshold: f64,
    /// How long the enlarge-on-locate pulse lasts before reverting
    pub pulse_duration_ms: u32,
    /// How long the red click flash lasts before reverting
    pub click_flash_ms: u32,
    /// Marker diameter in CSS pixels
    pub marker_size_px: f64,
    /// Boundary frame border width in CSS pixels
    pub frame_border_px: f64,
    /// Boundary frame border-colour animation period in seconds
    pub frame_pulse_period_s: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            intersection_threshold: 0.1,
            pulse_duration_ms: 300,
            click_flash_ms: 200,
            marker_size_px: 20.0,
            frame_border_px: 6.0,
            frame_pulse_period_s: 2.0,
        }
    }
}

impl TrackerConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: TrackerConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "pollIntervalMs must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.intersection_threshold) {
            return Err(ConfigError::Invalid(format!(
                "intersectionThreshold must be within [0, 1], got {}",
                self.intersection_threshold
            )));
        }
        if !self.marker_size_px.is_finite() || self.marker_size_px <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "markerSizePx must be positive, got {}",
                self.marker_size_px
            )));
        }
        if !self.frame_border_px.is_finite() || self.frame_border_px < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frameBorderPx must not be negative, got {}",
                self.frame_border_px
            )));
        }
        if !self.frame_pulse_period_s.is_finite() || self.frame_pulse_period_s <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "framePulsePeriodS must be positive, got {}",
                self.frame_pulse_period_s
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.pulse_duration_ms))
    }

    pub fn click_flash(&self) -> Duration {
        Duration::from_millis(u64::from(self.click_flash_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tracking_loop() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.intersection_threshold, 0.1);
        assert_eq!(config.click_flash(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TrackerConfig::from_json(r#"{"pollIntervalMs": 250}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.marker_size_px, 20.0);
        assert_eq!(config.pulse_duration_ms, 300);
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = TrackerConfig::from_json(r#"{"pollIntervalMs": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let err = TrackerConfig::from_json(r#"{"intersectionThreshold": 1.5}"#).unwrap_err();
        assert!(
            err.to_string().contains("intersectionThreshold"),
            "unexpected message: {}",
            err
        );
    }

    #[test]
    fn test_rejects_non_finite_geometry() {
        let nan_marker = TrackerConfig {
            marker_size_px: f64::NAN,
            ..TrackerConfig::default()
        };
        assert!(nan_marker.validate().is_err(), "NaN marker size accepted");

        let infinite_border = TrackerConfig {
            frame_border_px: f64::INFINITY,
            ..TrackerConfig::default()
        };
        assert!(infinite_border.validate().is_err());

        let nan_period = TrackerConfig {
            frame_pulse_period_s: f64::NAN,
            ..TrackerConfig::default()
        };
        assert!(nan_period.validate().is_err());

        let nan_threshold = TrackerConfig {
            intersection_threshold: f64::NAN,
            ..TrackerConfig::default()
        };
        assert!(nan_threshold.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = TrackerConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
