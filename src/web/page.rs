//! Browser page host
//!
//! Implements [`Page`] on top of `web-sys`. JS objects cannot cross threads,
//! so elements, timers, listeners and observers live in a thread-local
//! registry and the host itself only ever hands out numeric handles. Entries
//! are cloned out of the registry before any call that can run page script.

use crate::page::{
    Callback, ElementRef, ElementSummary, IntersectionCallback, ListenerId, Mount, ObserverId,
    OnceCallback, Page, PageError, PageEvent, PageResult, Rect, TimerId, VisibilityState,
};
use gloo_timers::callback::{Interval, Timeout};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Document, Element, EventTarget, HtmlElement, IntersectionObserver,
    IntersectionObserverEntry, IntersectionObserverInit, MouseEvent, MouseEventInit,
    ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition, Window,
};

struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut()>,
}

struct Observer {
    observer: IntersectionObserver,
    _closure: Closure<dyn FnMut(js_sys::Array)>,
}

#[derive(Default)]
struct Registry {
    next: u64,
    elements: HashMap<u64, Element>,
    intervals: HashMap<u64, Interval>,
    listeners: HashMap<u64, Listener>,
    observers: HashMap<u64, Observer>,
}

impl Registry {
    fn handle(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    /// Handle for an element, reusing the existing one if already known
    fn register(&mut self, element: Element) -> ElementRef {
        self.elements.retain(|_, known| known.is_connected());
        if let Some(id) = self
            .elements
            .iter()
            .find(|(_, known)| **known == element)
            .map(|(id, _)| *id)
        {
            return ElementRef(id);
        }
        let id = self.handle();
        self.elements.insert(id, element);
        ElementRef(id)
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

fn js_error(value: JsValue) -> PageError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| "Unknown script error".to_string());
    PageError::Script(message)
}

fn window() -> PageResult<Window> {
    web_sys::window().ok_or(PageError::NoDocument)
}

fn document() -> PageResult<Document> {
    window()?.document().ok_or(PageError::NoDocument)
}

fn element(handle: ElementRef) -> PageResult<Element> {
    REGISTRY
        .with(|registry| registry.borrow().elements.get(&handle.0).cloned())
        .filter(|element| element.is_connected())
        .ok_or(PageError::Detached(handle))
}

fn html_element(handle: ElementRef) -> PageResult<HtmlElement> {
    element(handle)?
        .dyn_into::<HtmlElement>()
        .map_err(|_| PageError::Script("Target element is not an HTML element".to_string()))
}

fn register(element: Element) -> ElementRef {
    REGISTRY.with(|registry| registry.borrow_mut().register(element))
}

/// Page host backed by the real DOM of the current document
#[derive(Debug, Default, Clone, Copy)]
pub struct WebPage;

impl Page for WebPage {
    fn query_selector(&self, selector: &str) -> PageResult<Option<ElementRef>> {
        let found = document()?
            .query_selector(selector)
            .map_err(|_| PageError::InvalidSelector {
                selector: selector.to_string(),
            })?;
        Ok(found.map(register))
    }

    fn bounding_rect(&self, handle: ElementRef) -> PageResult<Rect> {
        let rect = element(handle)?.get_bounding_client_rect();
        Ok(Rect::new(rect.left(), rect.top(), rect.width(), rect.height()))
    }

    fn describe(&self, handle: ElementRef) -> PageResult<ElementSummary> {
        let element = element(handle)?;
        let id = element.id();
        Ok(ElementSummary {
            tag: element.tag_name(),
            id: (!id.is_empty()).then_some(id),
        })
    }

    fn scroll_into_view(&self, handle: ElementRef) -> PageResult<()> {
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        element(handle)?.scroll_into_view_with_scroll_into_view_options(&options);
        Ok(())
    }

    fn dispatch_click(&self, handle: ElementRef, x: f64, y: f64) -> PageResult<bool> {
        let window = window()?;
        let init = MouseEventInit::new();
        init.set_bubbles(true);
        init.set_cancelable(true);
        init.set_view(Some(&window));
        init.set_client_x(x.round() as i32);
        init.set_client_y(y.round() as i32);

        let event = MouseEvent::new_with_mouse_event_init_dict("click", &init).map_err(js_error)?;
        element(handle)?.dispatch_event(&event).map_err(js_error)
    }

    fn node_by_id(&self, dom_id: &str) -> Option<ElementRef> {
        document().ok()?.get_element_by_id(dom_id).map(register)
    }

    fn create_node(&self, tag: &str, dom_id: &str, mount: Mount) -> PageResult<ElementRef> {
        let document = document()?;
        let node = document.create_element(tag).map_err(js_error)?;
        node.set_id(dom_id);

        match mount {
            Mount::Head => document
                .head()
                .ok_or(PageError::NoDocument)?
                .append_child(&node),
            Mount::Body => document
                .body()
                .ok_or(PageError::NoDocument)?
                .append_child(&node),
        }
        .map_err(js_error)?;

        Ok(register(node))
    }

    fn set_style(&self, handle: ElementRef, property: &str, value: &str) -> PageResult<()> {
        html_element(handle)?
            .style()
            .set_property(property, value)
            .map_err(js_error)
    }

    fn style(&self, handle: ElementRef, property: &str) -> PageResult<Option<String>> {
        let value = html_element(handle)?
            .style()
            .get_property_value(property)
            .map_err(js_error)?;
        Ok((!value.is_empty()).then_some(value))
    }

    fn set_text(&self, handle: ElementRef, text: &str) -> PageResult<()> {
        element(handle)?.set_text_content(Some(text));
        Ok(())
    }

    fn remove_node(&self, handle: ElementRef) -> PageResult<()> {
        let removed = REGISTRY.with(|registry| registry.borrow_mut().elements.remove(&handle.0));
        if let Some(element) = removed {
            element.remove();
        }
        Ok(())
    }

    fn is_attached(&self, handle: ElementRef) -> bool {
        element(handle).is_ok()
    }

    fn release_element(&self, handle: ElementRef) {
        REGISTRY.with(|registry| registry.borrow_mut().elements.remove(&handle.0));
    }

    fn offset_size(&self, handle: ElementRef) -> PageResult<(f64, f64)> {
        let element = html_element(handle)?;
        Ok((
            f64::from(element.offset_width()),
            f64::from(element.offset_height()),
        ))
    }

    fn set_interval(&self, period: Duration, callback: Callback) -> PageResult<TimerId> {
        let millis = u32::try_from(period.as_millis()).unwrap_or(u32::MAX).max(1);
        let interval = Interval::new(millis, move || callback());
        let id = REGISTRY.with(|registry| {
            let mut registry = registry.borrow_mut();
            let id = registry.handle();
            registry.intervals.insert(id, interval);
            id
        });
        Ok(TimerId(id))
    }

    fn clear_interval(&self, timer: TimerId) {
        // Dropping a gloo interval cancels it
        let interval = REGISTRY.with(|registry| registry.borrow_mut().intervals.remove(&timer.0));
        drop(interval);
    }

    fn set_timeout(&self, delay: Duration, callback: OnceCallback) -> PageResult<()> {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        Timeout::new(millis, move || callback()).forget();
        Ok(())
    }

    fn add_listener(&self, event: PageEvent, callback: Callback) -> PageResult<ListenerId> {
        let target: EventTarget = match event {
            PageEvent::Scroll | PageEvent::Resize => window()?.into(),
            PageEvent::VisibilityChange => document()?.into(),
        };

        let closure = Closure::<dyn FnMut()>::new(move || callback());
        let options = AddEventListenerOptions::new();
        options.set_passive(event.is_passive());
        target
            .add_event_listener_with_callback_and_add_event_listener_options(
                event.dom_name(),
                closure.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(js_error)?;

        let id = REGISTRY.with(|registry| {
            let mut registry = registry.borrow_mut();
            let id = registry.handle();
            registry.listeners.insert(
                id,
                Listener {
                    target,
                    event: event.dom_name(),
                    closure,
                },
            );
            id
        });
        Ok(ListenerId(id))
    }

    fn remove_listener(&self, listener: ListenerId) {
        let removed = REGISTRY.with(|registry| registry.borrow_mut().listeners.remove(&listener.0));
        if let Some(listener) = removed {
            let _ = listener.target.remove_event_listener_with_callback(
                listener.event,
                listener.closure.as_ref().unchecked_ref(),
            );
        }
    }

    fn observe_intersection(
        &self,
        handle: ElementRef,
        threshold: f64,
        callback: IntersectionCallback,
    ) -> PageResult<ObserverId> {
        let target = element(handle)?;

        let closure = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
            for entry in entries.iter() {
                let entry: IntersectionObserverEntry = entry.unchecked_into();
                callback(entry.is_intersecting() && entry.intersection_ratio() >= threshold);
            }
        });

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(threshold));
        let observer =
            IntersectionObserver::new_with_options(closure.as_ref().unchecked_ref(), &init)
                .map_err(js_error)?;
        observer.observe(&target);

        let id = REGISTRY.with(|registry| {
            let mut registry = registry.borrow_mut();
            let id = registry.handle();
            registry.observers.insert(
                id,
                Observer {
                    observer,
                    _closure: closure,
                },
            );
            id
        });
        Ok(ObserverId(id))
    }

    fn disconnect_observer(&self, observer: ObserverId) {
        let removed = REGISTRY.with(|registry| registry.borrow_mut().observers.remove(&observer.0));
        if let Some(entry) = removed {
            entry.observer.disconnect();
        }
    }

    fn visibility_state(&self) -> VisibilityState {
        match document().map(|document| document.visibility_state()) {
            Ok(web_sys::VisibilityState::Visible) => VisibilityState::Visible,
            _ => VisibilityState::Hidden,
        }
    }
}
