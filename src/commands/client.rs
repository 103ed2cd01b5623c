//! Panel-side client
//!
//! Sends commands to the content script of a tab. Browser-internal pages are
//! refused up front, and a failed `ping` is taken to mean the content script
//! is not loaded yet, so it is injected before the command goes out.

use crate::commands::protocol::{CommandResponse, Request};
use crate::tracking::TrackingError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// URL schemes the browser never lets an extension script into
const RESTRICTED_PREFIXES: [&str; 4] = ["chrome://", "chrome-extension://", "edge://", "about:"];

pub fn is_restricted_url(url: &str) -> bool {
    RESTRICTED_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

/// The active tab a command is aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: u32,
    pub url: Option<String>,
}

impl TabInfo {
    pub fn is_restricted(&self) -> bool {
        self.url.as_deref().is_some_and(is_restricted_url)
    }
}

/// Message channel to a tab's content script
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, tab_id: u32, request: &Request) -> anyhow::Result<CommandResponse>;

    /// Load the content script into the tab
    async fn inject(&self, tab_id: u32) -> anyhow::Result<()>;
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Please enter a valid CSS selector")]
    EmptySelector,

    #[error("Position cursor on an element before clicking")]
    NoActiveCursor,

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("Failed to inject content script: {0}")]
    Injection(anyhow::Error),

    #[error("Error: {0}")]
    Transport(anyhow::Error),

    /// The content script answered with `success: false`
    #[error("{0}")]
    Rejected(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

pub struct CursorClient<T> {
    transport: T,
    cursor_active: AtomicBool,
}

impl<T: Transport> CursorClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cursor_active: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether the last locate succeeded and nothing has hidden it since
    pub fn is_cursor_active(&self) -> bool {
        self.cursor_active.load(Ordering::SeqCst)
    }

    /// Inject the content script unless it already answers `ping`
    pub async fn ensure_injected(&self, tab: &TabInfo) -> ClientResult<()> {
        match self.transport.send(tab.id, &Request::Ping).await {
            Ok(response) if response.success => return Ok(()),
            Ok(_) => tracing::debug!("Content script in tab {} refused ping", tab.id),
            Err(e) => tracing::debug!("Content script in tab {} not reachable: {}", tab.id, e),
        }

        tracing::info!("Injecting content script into tab {}", tab.id);
        self.transport
            .inject(tab.id)
            .await
            .map_err(ClientError::Injection)
    }

    pub async fn move_cursor(&self, tab: &TabInfo, selector: &str) -> ClientResult<String> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(ClientError::EmptySelector);
        }
        if tab.is_restricted() {
            return Err(TrackingError::RestrictedContext {
                action: "move cursor",
            }
            .into());
        }

        let request = Request::MoveCursor {
            selector: selector.to_string(),
        };
        let result = match self.ensure_injected(tab).await {
            Ok(()) => self.round_trip(tab, request).await,
            Err(e) => Err(e),
        };
        self.cursor_active.store(result.is_ok(), Ordering::SeqCst);
        result
    }

    pub async fn click(&self, tab: &TabInfo) -> ClientResult<String> {
        if !self.is_cursor_active() {
            return Err(ClientError::NoActiveCursor);
        }
        if tab.is_restricted() {
            return Err(TrackingError::RestrictedContext {
                action: "click elements",
            }
            .into());
        }
        self.round_trip(tab, Request::ClickElement).await
    }

    pub async fn hide(&self, tab: &TabInfo) -> ClientResult<String> {
        let message = self.round_trip(tab, Request::HideCursor).await?;
        self.cursor_active.store(false, Ordering::SeqCst);
        Ok(message)
    }

    pub async fn cleanup(&self, tab: &TabInfo) -> ClientResult<String> {
        let message = self.round_trip(tab, Request::CleanupAll).await?;
        self.cursor_active.store(false, Ordering::SeqCst);
        Ok(message)
    }

    async fn round_trip(&self, tab: &TabInfo, request: Request) -> ClientResult<String> {
        let response = self
            .transport
            .send(tab.id, &request)
            .await
            .map_err(ClientError::Transport)?;

        if response.success {
            Ok(response.message().to_string())
        } else {
            Err(ClientError::Rejected(response.message().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Dispatcher;
    use crate::page::{ElementSpec, Rect, SimulatedPage};
    use crate::tracking::Tracker;
    use parking_lot::Mutex as ParkingMutex;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Routes requests to a dispatcher once "injected"
    struct FakeTransport {
        page: Arc<SimulatedPage>,
        dispatcher: ParkingMutex<Option<Dispatcher>>,
        injections: AtomicUsize,
        sent: ParkingMutex<Vec<Request>>,
        injection_fails: bool,
    }

    impl FakeTransport {
        fn new(injection_fails: bool) -> Self {
            let page = Arc::new(SimulatedPage::default());
            page.add_element(
                ElementSpec::new("button")
                    .id("submit-btn")
                    .rect(Rect::new(10.0, 10.0, 60.0, 20.0)),
            );
            Self {
                page,
                dispatcher: ParkingMutex::new(None),
                injections: AtomicUsize::new(0),
                sent: ParkingMutex::new(Vec::new()),
                injection_fails,
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, _tab_id: u32, request: &Request) -> anyhow::Result<CommandResponse> {
            self.sent.lock().push(request.clone());
            let dispatcher = self.dispatcher.lock().clone();
            match dispatcher {
                Some(dispatcher) => Ok(dispatcher.dispatch(request.clone())),
                None => anyhow::bail!("Could not establish connection. Receiving end does not exist."),
            }
        }

        async fn inject(&self, _tab_id: u32) -> anyhow::Result<()> {
            if self.injection_fails {
                anyhow::bail!("Cannot access contents of the page");
            }
            self.injections.fetch_add(1, Ordering::SeqCst);
            let tracker = Tracker::new(self.page.clone());
            *self.dispatcher.lock() = Some(Dispatcher::new(tracker));
            Ok(())
        }
    }

    fn tab(url: &str) -> TabInfo {
        TabInfo {
            id: 7,
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_restricted_urls() {
        assert!(is_restricted_url("chrome://extensions"));
        assert!(is_restricted_url("chrome-extension://abc/panel.html"));
        assert!(is_restricted_url("edge://settings"));
        assert!(is_restricted_url("about:blank"));
        assert!(!is_restricted_url("https://example.com"));
        assert!(!TabInfo { id: 1, url: None }.is_restricted());
    }

    #[tokio::test]
    async fn test_move_cursor_injects_after_failed_ping() {
        let client = CursorClient::new(FakeTransport::new(false));
        let message = client
            .move_cursor(&tab("https://example.com"), "  #submit-btn ")
            .await
            .unwrap();

        assert_eq!(message, "Cursor moved to #submit-btn");
        assert!(client.is_cursor_active());
        assert_eq!(client.transport().injections.load(Ordering::SeqCst), 1);

        // Already loaded: the second locate only pings
        client
            .move_cursor(&tab("https://example.com"), "#submit-btn")
            .await
            .unwrap();
        assert_eq!(client.transport().injections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restricted_tab_is_refused_before_sending() {
        let client = CursorClient::new(FakeTransport::new(false));
        let err = client
            .move_cursor(&tab("chrome://settings"), "#submit-btn")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Cannot move cursor on browser internal pages");
        assert!(client.transport().sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_selector_rejected() {
        let client = CursorClient::new(FakeTransport::new(false));
        let err = client
            .move_cursor(&tab("https://example.com"), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::EmptySelector));
    }

    #[tokio::test]
    async fn test_injection_failure_is_reported() {
        let client = CursorClient::new(FakeTransport::new(true));
        let err = client
            .move_cursor(&tab("https://example.com"), "#submit-btn")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to inject content script: Cannot access contents of the page"
        );
        assert!(!client.is_cursor_active());
    }

    #[tokio::test]
    async fn test_click_requires_active_cursor() {
        let client = CursorClient::new(FakeTransport::new(false));
        let page = tab("https://example.com");

        let err = client.click(&page).await.unwrap_err();
        assert!(matches!(err, ClientError::NoActiveCursor));

        client.move_cursor(&page, "#submit-btn").await.unwrap();
        let message = client.click(&page).await.unwrap();
        assert_eq!(message, "Clicked on element: button#submit-btn");

        client.hide(&page).await.unwrap();
        assert!(!client.is_cursor_active());
    }

    #[tokio::test]
    async fn test_failed_locate_clears_active_flag() {
        let client = CursorClient::new(FakeTransport::new(false));
        let page = tab("https://example.com");

        client.move_cursor(&page, "#submit-btn").await.unwrap();
        let err = client.move_cursor(&page, ".missing-class").await.unwrap_err();

        assert_eq!(err.to_string(), "Element \".missing-class\" not found");
        assert!(!client.is_cursor_active());
    }
}
