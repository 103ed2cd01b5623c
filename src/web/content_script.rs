//! Content script entry point
//!
//! Wires a [`Dispatcher`] over the live page to `chrome.runtime.onMessage`.
//! The script may be injected more than once into the same tab; a flag on
//! `window` makes every load after the first a no-op.

use crate::commands::{Dispatcher, Request};
use crate::tracking::Tracker;
use crate::web::WebPage;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

const INSTALLED_FLAG: &str = "__virtualCursorInstalled";

type MessageListener = Closure<dyn FnMut(JsValue, JsValue, js_sys::Function) -> bool>;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    fn add_message_listener(listener: &MessageListener);
}

#[wasm_bindgen(start)]
pub fn start() {
    install();
}

/// Register the message handler unless a previous load already did
pub fn install() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let flag = JsValue::from_str(INSTALLED_FLAG);
    if js_sys::Reflect::get(&window, &flag)
        .map(|value| value.is_truthy())
        .unwrap_or(false)
    {
        tracing::debug!("Content script already installed");
        return;
    }

    crate::init_logging();

    let dispatcher = Dispatcher::new(Tracker::new(Arc::new(WebPage)));

    let listener = MessageListener::new(
        move |message: JsValue, _sender: JsValue, send_response: js_sys::Function| {
            // Messages meant for other listeners are left alone
            let Ok(request) = serde_wasm_bindgen::from_value::<Request>(message) else {
                return false;
            };

            let response = dispatcher.dispatch(request);
            match serde_wasm_bindgen::to_value(&response) {
                Ok(value) => {
                    if let Err(e) = send_response.call1(&JsValue::NULL, &value) {
                        tracing::warn!("Failed to send response: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Failed to encode response: {}", e),
            }
            // Keep the channel open for the reply
            true
        },
    );
    add_message_listener(&listener);
    listener.forget();

    if js_sys::Reflect::set(&window, &flag, &JsValue::TRUE).is_err() {
        tracing::warn!("Could not mark content script as installed");
    }
    tracing::info!("Content script installed");
}
