//! Browser bindings
//!
//! Only built for `wasm32`. Provides the DOM-backed page host, a console log
//! sink, and the content script entry point.

pub mod console;
pub mod content_script;
pub mod page;

pub use content_script::install;
pub use page::WebPage;
