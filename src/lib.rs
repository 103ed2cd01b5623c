//! Virtual Cursor - point at, follow, and click page elements.
//!
//! This is the core of the Virtual Cursor extension. It provides the element
//! tracker behind the on-page marker, the overlay it draws, the command
//! protocol the extension panel speaks, and the browser bindings that run it
//! all as a content script.

pub mod commands;
pub mod config;
pub mod overlay;
pub mod page;
pub mod tracking;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use commands::{CommandResponse, Dispatcher, Request};
pub use config::{ConfigError, TrackerConfig};
pub use tracking::{Tracker, TrackerStatus, TrackingError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// Honors `RUST_LOG` where the platform has an environment. Safe to call
/// more than once; only the first call installs a subscriber.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "virtual_cursor=debug".into());

    #[cfg(not(target_arch = "wasm32"))]
    let fmt = tracing_subscriber::fmt::layer();

    // The console stamps its own time
    #[cfg(target_arch = "wasm32")]
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(web::console::MakeConsoleWriter)
        .without_time()
        .with_ansi(false);

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init()
        .is_ok()
    {
        tracing::info!("Starting Virtual Cursor v{}", env!("CARGO_PKG_VERSION"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        tracing::debug!("still alive");
    }
}
