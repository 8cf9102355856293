//! The shared cross-frame message channel of a parent window.
//!
//! Every listener sees every message posted to the window, dashboard
//! notification or not. Each listener gets its own unbounded queue, like a
//! window's event queue, so unrelated traffic never pushes a notification out.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::feed::NotificationSink;
use crate::message::Notification;

type Listeners = Vec<mpsc::UnboundedSender<Value>>;

/// A window's `message` event target.
#[derive(Clone)]
pub struct MessageBus {
    listeners: Arc<Mutex<Listeners>>,
}

fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MessageBus {
    pub fn new() -> Self {
        MessageBus { listeners: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Post a message with an open target origin. Posting with no listener
    /// attached is not an error; the message is simply not seen.
    pub fn post_message(&self, data: Value) {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|tx| tx.send(data.clone()).is_ok());
        if listeners.is_empty() {
            debug!("message posted with no listener attached");
        }
    }

    /// Attach a listener. It sees every message posted from now on, until the
    /// receiver is dropped.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.listeners).push(tx);
        rx
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Posts notifications to the parent window, if the document has one.
#[derive(Clone, Default)]
pub struct ParentSink {
    parent: Option<MessageBus>,
}

impl ParentSink {
    /// The hosting document is embedded in `parent`.
    pub fn embedded(parent: MessageBus) -> Self {
        ParentSink { parent: Some(parent) }
    }

    /// The hosting document is the top-level one.
    pub fn top_level() -> Self {
        ParentSink { parent: None }
    }

    /// Move the document into a frame of `parent`.
    pub fn reparent(&mut self, parent: MessageBus) {
        self.parent = Some(parent);
    }
}

impl NotificationSink for ParentSink {
    fn is_embedded(&self) -> bool {
        self.parent.is_some()
    }

    fn post(&mut self, notification: &Notification) {
        if let Some(parent) = &self.parent {
            parent.post_message(notification.to_value());
        }
    }
}
