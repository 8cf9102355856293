//! Browser bindings.
//!
//! `start_marker_observer` runs inside the chat frame; `DashboardMount` runs in
//! the parent page. Both reuse the native-independent core: the observer
//! walks `web_sys::Node`s through [`DocumentNode`], the mount decodes
//! `MessageEvent` data through [`DashboardState`].

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Array;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    console, Document, Element, HtmlIFrameElement, MessageEvent,
    MutationObserver, MutationObserverInit, MutationRecord, Node, NodeList, Window,
};

use crate::feed::{DocumentNode, Mutation, NodeKind, NotificationSink, ReadyState};
use crate::message::Notification;
use crate::observer::MarkerObserver;
use crate::render::{DashboardState, FrameSlot, RenderAction, DEFAULT_FRAME_TITLE};

const PLACEHOLDER_HTML: &str = r#"<div class="placeholder"><div class="card"><div class="icon">📊</div><h3>No Dashboard Yet</h3><p>Start a conversation in the chat to create a dashboard. Ask the AI to analyze data and generate visualizations.</p></div></div>"#;

fn node_list(list: &NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

impl DocumentNode for Node {
    fn kind(&self) -> NodeKind {
        match self.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn text_content(&self) -> Option<String> {
        Node::text_content(self)
    }

    fn parent_element(&self) -> Option<Self> {
        Node::parent_element(self).map(Node::from)
    }

    fn descendant_elements(&self) -> Vec<Self> {
        self.dyn_ref::<Element>()
            .and_then(|element| element.query_selector_all("*").ok())
            .map(|list| node_list(&list))
            .unwrap_or_default()
    }
}

fn to_batch(records: &Array) -> Vec<Mutation<Node>> {
    records
        .iter()
        .filter_map(|value| value.dyn_into::<MutationRecord>().ok())
        .filter_map(|record| match record.type_().as_str() {
            "childList" => Some(Mutation::NodesAdded(node_list(&record.added_nodes()))),
            "characterData" => record.target().map(Mutation::TextChanged),
            _ => None,
        })
        .collect()
}

/// Posts to `window.parent` with target origin `*`.
struct WindowSink {
    window: Window,
}

impl WindowSink {
    fn parent(&self) -> Option<Window> {
        let parent = self.window.parent().ok().flatten()?;
        (!js_sys::Object::is(parent.as_ref(), self.window.as_ref())).then_some(parent)
    }
}

impl NotificationSink for WindowSink {
    fn is_embedded(&self) -> bool {
        self.parent().is_some()
    }

    fn post(&mut self, notification: &Notification) {
        let Some(parent) = self.parent() else {
            return;
        };
        let Ok(data) = serde_wasm_bindgen::to_value(notification) else {
            return;
        };
        if parent.post_message(&data, "*").is_ok() {
            console::log_2(&"[dashboard-relay] dashboard sent to parent:".into(), &data);
        }
    }
}

fn missing(what: &str) -> JsValue {
    JsValue::from_str(&format!("dashboard-relay: no {what}"))
}

/// Start watching the chat document for dashboard markers. Defers until
/// `DOMContentLoaded` while the document is still loading.
#[wasm_bindgen]
pub fn start_marker_observer() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| missing("window"))?;
    let document = window.document().ok_or_else(|| missing("document"))?;
    if !ReadyState::from_dom(&document.ready_state()).is_parsed() {
        let deferred = Closure::once_into_js(move || {
            if let Err(e) = attach_observer(&window) {
                console::error_1(&e);
            }
        });
        document.add_event_listener_with_callback("DOMContentLoaded", deferred.unchecked_ref())?;
        return Ok(());
    }
    attach_observer(&window)
}

fn attach_observer(window: &Window) -> Result<(), JsValue> {
    let document = window.document().ok_or_else(|| missing("document"))?;
    let body = document.body().ok_or_else(|| missing("body"))?;
    let observer = Rc::new(RefCell::new(MarkerObserver::new(WindowSink { window: window.clone() })));

    let handler = Rc::clone(&observer);
    let callback = Closure::<dyn FnMut(Array, MutationObserver)>::new(
        move |records: Array, _observer: MutationObserver| {
            handler.borrow_mut().handle_batch(&to_batch(&records));
        },
    );
    let mutation_observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    init.set_character_data(true);
    mutation_observer.observe_with_options(&body, &init)?;
    // Lives for the page.
    callback.forget();

    let existing = document.query_selector_all("*")?;
    observer.borrow_mut().scan_elements(node_list(&existing));
    Ok(())
}

struct Pane {
    document: Document,
    container: Element,
    title: String,
    dashboard: DashboardState,
    slot: FrameSlot,
}

impl Pane {
    fn render(&mut self) -> Result<(), JsValue> {
        match self.slot.reconcile(&self.dashboard.view(&self.title)) {
            RenderAction::Unchanged => {}
            RenderAction::ShowPlaceholder => self.container.set_inner_html(PLACEHOLDER_HTML),
            RenderAction::Mount(spec) => {
                let frame: HtmlIFrameElement = self.document.create_element("iframe")?.dyn_into()?;
                frame.set_src(&spec.src);
                frame.set_title(&spec.title);
                frame.set_attribute("data-frame-key", &spec.key)?;
                self.container.set_inner_html("");
                self.container.append_child(&frame)?;
            }
        }
        Ok(())
    }
}

/// Parent-page dashboard pane: placeholder until a valid notification
/// arrives, then a frame keyed on the endpoint.
#[wasm_bindgen]
pub struct DashboardMount {
    window: Window,
    pane: Rc<RefCell<Pane>>,
    listener: Option<Closure<dyn FnMut(MessageEvent)>>,
}

#[wasm_bindgen]
impl DashboardMount {
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, title: Option<String>) -> Result<DashboardMount, JsValue> {
        let window = web_sys::window().ok_or_else(|| missing("window"))?;
        let document = window.document().ok_or_else(|| missing("document"))?;
        let container = document
            .get_element_by_id(container_id)
            .ok_or_else(|| missing(&format!("element #{container_id}")))?;

        let pane = Rc::new(RefCell::new(Pane {
            document,
            container,
            title: title.unwrap_or_else(|| DEFAULT_FRAME_TITLE.to_string()),
            dashboard: DashboardState::new(),
            slot: FrameSlot::new(),
        }));
        pane.borrow_mut().render()?;

        let handler = Rc::clone(&pane);
        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let Ok(data) = serde_wasm_bindgen::from_value::<serde_json::Value>(event.data()) else {
                return;
            };
            let mut pane = handler.borrow_mut();
            if pane.dashboard.apply_message(&data) {
                if let Err(e) = pane.render() {
                    console::error_1(&e);
                }
            }
        });
        window.add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())?;

        Ok(DashboardMount { window, pane, listener: Some(listener) })
    }

    /// URL of the mounted dashboard frame, if any.
    #[wasm_bindgen(getter)]
    pub fn url(&self) -> Option<String> {
        self.pane.borrow().dashboard.state().endpoint().map(|e| e.url())
    }

    /// Remove the message listener. Idempotent.
    pub fn unmount(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = self
                .window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
        }
    }
}

impl Drop for DashboardMount {
    fn drop(&mut self) {
        self.unmount();
    }
}
