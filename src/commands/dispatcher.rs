//! Command dispatcher
//!
//! Maps protocol requests onto the tracker. Every outcome, including a panic
//! inside a handler, comes back as a `CommandResponse`; nothing is thrown
//! across the command boundary.

use crate::commands::protocol::{CommandResponse, Request};
use crate::tracking::Tracker;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::{mpsc, oneshot};

/// A request paired with the channel its reply goes back on
pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<CommandResponse>,
}

impl Envelope {
    pub fn new(request: Request) -> (Self, oneshot::Receiver<CommandResponse>) {
        let (reply, receiver) = oneshot::channel();
        (Self { request, reply }, receiver)
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    tracker: Tracker,
}

impl Dispatcher {
    pub fn new(tracker: Tracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Run a request and always produce a response
    pub fn dispatch(&self, request: Request) -> CommandResponse {
        let action = request.action();
        tracing::debug!("Handling {}", action);

        match catch_unwind(AssertUnwindSafe(|| self.handle(request))) {
            Ok(response) => {
                if !response.success {
                    tracing::info!("{} failed: {}", action, response.message());
                }
                response
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unexpected failure".to_string());
                tracing::error!("{} panicked: {}", action, detail);
                CommandResponse::failure(format!("Error: {}", detail))
            }
        }
    }

    /// Decode a JSON request, run it, and encode the reply
    pub fn dispatch_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<Request>(raw) {
            Ok(request) => self.dispatch(request),
            Err(e) => {
                tracing::warn!("Rejected malformed request: {}", e);
                CommandResponse::failure(format!("Invalid request: {}", e))
            }
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|_| r#"{"success":false,"message":"Failed to encode response"}"#.to_string())
    }

    /// Answer requests until every sender has been dropped
    pub async fn serve(&self, mut requests: mpsc::UnboundedReceiver<Envelope>) {
        tracing::info!("Command loop started");
        while let Some(envelope) = requests.recv().await {
            let response = self.dispatch(envelope.request);
            if envelope.reply.send(response).is_err() {
                tracing::debug!("Caller went away before the reply was sent");
            }
        }
        tracing::info!("Command loop stopped");
    }

    fn handle(&self, request: Request) -> CommandResponse {
        match request {
            Request::Ping => CommandResponse::ack(),
            Request::MoveCursor { selector } => match self.tracker.locate(&selector) {
                Ok(_) => CommandResponse::ok(format!("Cursor moved to {}", selector)),
                Err(e) => e.into(),
            },
            Request::ClickElement => match self.tracker.click() {
                Ok(summary) => CommandResponse::ok(format!("Clicked on element: {}", summary)),
                Err(e) => e.into(),
            },
            Request::HideCursor => match self.tracker.hide() {
                Ok(()) => CommandResponse::ok("Cursor hidden"),
                Err(e) => e.into(),
            },
            Request::CleanupAll => match self.tracker.cleanup() {
                Ok(()) => CommandResponse::ok("All extension elements cleaned up"),
                Err(e) => e.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementSpec, Rect, SimulatedPage};
    use std::sync::Arc;

    fn dispatcher() -> (Arc<SimulatedPage>, Dispatcher) {
        let page = Arc::new(SimulatedPage::new(1024.0, 768.0));
        page.add_element(
            ElementSpec::new("button")
                .id("submit-btn")
                .rect(Rect::new(40.0, 40.0, 120.0, 32.0)),
        );
        let dispatcher = Dispatcher::new(Tracker::new(page.clone()));
        (page, dispatcher)
    }

    fn move_cursor(selector: &str) -> Request {
        Request::MoveCursor {
            selector: selector.to_string(),
        }
    }

    #[test]
    fn test_ping_acknowledges() {
        let (_, dispatcher) = dispatcher();
        assert_eq!(dispatcher.dispatch(Request::Ping), CommandResponse::ack());
    }

    #[test]
    fn test_move_then_click() {
        let (_, dispatcher) = dispatcher();

        let moved = dispatcher.dispatch(move_cursor("#submit-btn"));
        assert!(moved.success);
        assert_eq!(moved.message(), "Cursor moved to #submit-btn");

        let clicked = dispatcher.dispatch(Request::ClickElement);
        assert!(clicked.success);
        assert_eq!(clicked.message(), "Clicked on element: button#submit-btn");
    }

    #[test]
    fn test_hide_and_cleanup_messages() {
        let (_, dispatcher) = dispatcher();
        dispatcher.dispatch(move_cursor("#submit-btn"));

        assert_eq!(
            dispatcher.dispatch(Request::HideCursor),
            CommandResponse::ok("Cursor hidden")
        );
        assert_eq!(
            dispatcher.dispatch(Request::CleanupAll),
            CommandResponse::ok("All extension elements cleaned up")
        );
    }

    #[test]
    fn test_invalid_selector_is_reported_not_thrown() {
        let (page, dispatcher) = dispatcher();
        let response = dispatcher.dispatch(move_cursor("ul > li"));
        assert!(!response.success);
        assert!(response.message().starts_with("Error: "));
        assert_eq!(page.active_timers(), 0);
    }

    #[test]
    fn test_dispatch_json_round_trip() {
        let (_, dispatcher) = dispatcher();
        let reply = dispatcher.dispatch_json(r#"{"action":"moveCursor","selector":".missing-class"}"#);
        assert_eq!(
            reply,
            r#"{"success":false,"message":"Element \".missing-class\" not found"}"#
        );
    }

    #[test]
    fn test_dispatch_json_rejects_unknown_action() {
        let (_, dispatcher) = dispatcher();
        let reply: CommandResponse =
            serde_json::from_str(&dispatcher.dispatch_json(r#"{"action":"teleport"}"#)).unwrap();
        assert!(!reply.success);
        assert!(reply.message().starts_with("Invalid request: "));
    }

    #[tokio::test]
    async fn test_serve_answers_each_envelope() {
        let (_, dispatcher) = dispatcher();
        let (tx, rx) = mpsc::unbounded_channel();

        let (ping, ping_reply) = Envelope::new(Request::Ping);
        let (click, click_reply) = Envelope::new(Request::ClickElement);
        tx.send(ping).unwrap();
        tx.send(click).unwrap();
        drop(tx);

        dispatcher.serve(rx).await;

        assert!(ping_reply.await.unwrap().success);
        let click = click_reply.await.unwrap();
        assert!(!click.success);
        assert_eq!(click.message(), "No element selected to click");
    }
}
