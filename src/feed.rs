//! The change-feed seam between the detection algorithm and whatever DOM it
//! runs against.
//!
//! The browser adapter (`wasm` module) and the in-memory document used by the
//! native build and tests both deliver [`Mutation`] batches over nodes that
//! implement [`DocumentNode`]; the observer never touches a concrete DOM type.

use crate::message::Notification;

/// The node kinds the detection algorithm distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Comments, processing instructions, document fragments...
    Other,
}

/// Read-only view of a live document node.
pub trait DocumentNode: Sized {
    fn kind(&self) -> NodeKind;

    /// Concatenated text of this node and its descendants, `None` if the node
    /// has no text content at all.
    fn text_content(&self) -> Option<String>;

    fn parent_element(&self) -> Option<Self>;

    /// Every element below this one, in document order, excluding itself.
    fn descendant_elements(&self) -> Vec<Self>;
}

/// One mutation record as delivered in a batch.
#[derive(Debug, Clone)]
pub enum Mutation<N> {
    /// A child-list change. Removed nodes are not reported; they cannot
    /// introduce a marker.
    NodesAdded(Vec<N>),
    /// In-place character data change on `target` (a text node).
    TextChanged(N),
}

/// Document loading phase, as far as activation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    /// Whether the initial parse has finished and observation may start.
    pub fn is_parsed(self) -> bool {
        !matches!(self, ReadyState::Loading)
    }

    /// Map `document.readyState`. Unknown values count as parsed.
    pub fn from_dom(state: &str) -> Self {
        match state {
            "loading" => ReadyState::Loading,
            "interactive" => ReadyState::Interactive,
            _ => ReadyState::Complete,
        }
    }
}

/// Where the observer sends notifications.
pub trait NotificationSink {
    /// `false` when the hosting document is the top-level one; posting is
    /// then skipped.
    fn is_embedded(&self) -> bool;

    fn post(&mut self, notification: &Notification);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn is_embedded(&self) -> bool {
        (**self).is_embedded()
    }

    fn post(&mut self, notification: &Notification) {
        (**self).post(notification)
    }
}

/// Sink that keeps every posted notification; always embedded.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub posted: Vec<Notification>,
}

impl NotificationSink for RecordingSink {
    fn is_embedded(&self) -> bool {
        true
    }

    fn post(&mut self, notification: &Notification) {
        self.posted.push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_is_parsed() {
        assert!(!ReadyState::Loading.is_parsed());
        assert!(ReadyState::Interactive.is_parsed());
        assert!(ReadyState::Complete.is_parsed());
    }

    #[test]
    fn test_ready_state_from_dom_string() {
        assert_eq!(ReadyState::from_dom("loading"), ReadyState::Loading);
        assert_eq!(ReadyState::from_dom("interactive"), ReadyState::Interactive);
        assert_eq!(ReadyState::from_dom("complete"), ReadyState::Complete);
        assert!(!ReadyState::from_dom("loading").is_parsed());
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut sink: Box<RecordingSink> = Box::default();
        assert!(sink.is_embedded());
        sink.post(&Notification::DashboardPort { host: None, port: 9000 });
        assert_eq!(sink.posted.len(), 1);
    }
}
