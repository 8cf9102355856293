//! # Marker Observer
//!
//! ## Responsibility
//! Watch a live, externally mutated document for dashboard markers and post
//! one [`Notification`] per change of discovered endpoint to the parent frame.
//!
//! ## Guarantees
//! - Never posts the same endpoint twice in a row; always posts when the
//!   decoded endpoint differs from the last one posted
//! - Covers subtree insertion, bare text-node insertion and in-place text
//!   edits, plus one full scan of pre-existing elements at attach time
//! - Malformed markers are skipped silently
//! - At top level (not embedded) nothing is posted and the dedupe key is left
//!   alone, so the endpoint is delivered once the document is embedded
//!
//! ## NOT Responsible For
//! - Retrying missed mutations (only the attach-time scan recovers them)
//! - Verifying the dashboard is reachable

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::feed::{DocumentNode, Mutation, NodeKind, NotificationSink};
use crate::marker::{decode_marker, may_contain_marker};
use crate::message::Notification;

/// Detection and duplicate-suppression state for one document.
pub struct MarkerObserver<S> {
    sink: S,
    /// Canonical key of the last endpoint actually posted.
    last_key: Option<String>,
    /// Last endpoint decoded, posted or not.
    last_seen: Option<Endpoint>,
    posted: usize,
}

impl<S: NotificationSink> MarkerObserver<S> {
    pub fn new(sink: S) -> Self {
        MarkerObserver { sink, last_key: None, last_seen: None, posted: 0 }
    }

    pub fn last_key(&self) -> Option<&str> {
        self.last_key.as_deref()
    }

    pub fn last_seen(&self) -> Option<&Endpoint> {
        self.last_seen.as_ref()
    }

    /// Number of notifications posted so far.
    pub fn posted(&self) -> usize {
        self.posted
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Test one piece of text. Returns `true` if a notification was posted.
    pub fn check_text(&mut self, text: &str) -> bool {
        if !may_contain_marker(text) {
            return false;
        }
        let Some(endpoint) = decode_marker(text) else {
            return false;
        };
        let key = endpoint.key();
        self.last_seen = Some(endpoint.clone());

        if self.last_key.as_deref() == Some(key.as_str()) {
            debug!(endpoint = %key, "dashboard marker unchanged; skipping");
            return false;
        }
        if !self.sink.is_embedded() {
            debug!(endpoint = %key, "not embedded; dashboard notification suppressed");
            return false;
        }

        self.sink.post(&Notification::for_endpoint(&endpoint));
        info!(host = endpoint.host(), port = endpoint.port(), "dashboard sent to parent");
        self.last_key = Some(key);
        self.posted += 1;
        true
    }

    fn check_node<N: DocumentNode>(&mut self, node: &N) {
        if let Some(text) = node.text_content() {
            self.check_text(&text);
        }
    }

    /// Scan one delivered batch of mutation records.
    pub fn handle_batch<N: DocumentNode>(&mut self, batch: &[Mutation<N>]) {
        for mutation in batch {
            match mutation {
                Mutation::NodesAdded(nodes) => {
                    for node in nodes {
                        match node.kind() {
                            NodeKind::Element => {
                                self.check_node(node);
                                for child in node.descendant_elements() {
                                    self.check_node(&child);
                                }
                            }
                            NodeKind::Text => {
                                if let Some(parent) = node.parent_element() {
                                    self.check_node(&parent);
                                }
                            }
                            NodeKind::Other => {}
                        }
                    }
                }
                Mutation::TextChanged(target) => {
                    if let Some(parent) = target.parent_element() {
                        self.check_node(&parent);
                    }
                }
            }
        }
    }

    /// Attach-time scan over every element already in the document.
    pub fn scan_elements<N, I>(&mut self, elements: I)
    where
        N: DocumentNode,
        I: IntoIterator<Item = N>,
    {
        for element in elements {
            self.check_node(&element);
        }
    }
}

// ---------------------------------------------------------------------------
// Async driver over a change feed (native builds)
// ---------------------------------------------------------------------------

#[cfg(not(target_arch = "wasm32"))]
pub use native::{AttachedObserver, ChangeFeed};

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use tokio::sync::{mpsc, watch};

    use super::MarkerObserver;
    use crate::feed::{DocumentNode, Mutation, NotificationSink, ReadyState};

    /// A document that can be observed for mutation batches.
    pub trait ChangeFeed {
        type Node: DocumentNode;

        fn ready_state(&self) -> watch::Receiver<ReadyState>;

        /// Start recording mutations; each delivered batch arrives on the
        /// returned receiver. The receiver closes when the document goes away.
        fn observe(&self) -> mpsc::UnboundedReceiver<Vec<Mutation<Self::Node>>>;

        /// Every element currently in the document, in document order.
        fn all_elements(&self) -> Vec<Self::Node>;
    }

    /// An observer that has subscribed to a feed and done its initial scan.
    pub struct AttachedObserver<S, N> {
        observer: MarkerObserver<S>,
        batches: mpsc::UnboundedReceiver<Vec<Mutation<N>>>,
    }

    impl<S: NotificationSink> MarkerObserver<S> {
        /// Subscribe first, then scan, so nothing slips in between.
        /// The feed must already be parsed; see [`MarkerObserver::observe_when_ready`].
        pub fn attach<F: ChangeFeed>(mut self, feed: &F) -> AttachedObserver<S, F::Node> {
            let batches = feed.observe();
            self.scan_elements(feed.all_elements());
            AttachedObserver { observer: self, batches }
        }

        /// Wait for the initial parse, attach, and run until the feed closes.
        pub async fn observe_when_ready<F: ChangeFeed>(self, feed: F) -> Self {
            let mut ready = feed.ready_state();
            let parsed = ready.wait_for(|state| state.is_parsed()).await.is_ok();
            if !parsed {
                return self;
            }
            self.attach(&feed).run().await
        }
    }

    impl<S: NotificationSink, N: DocumentNode> AttachedObserver<S, N> {
        pub fn observer(&self) -> &MarkerObserver<S> {
            &self.observer
        }

        pub fn observer_mut(&mut self) -> &mut MarkerObserver<S> {
            &mut self.observer
        }

        /// Handle every batch already delivered without waiting. Returns the
        /// number of batches processed.
        pub fn process_pending(&mut self) -> usize {
            let mut handled = 0;
            while let Ok(batch) = self.batches.try_recv() {
                self.observer.handle_batch(&batch);
                handled += 1;
            }
            handled
        }

        /// Handle batches until the feed closes.
        pub async fn run(mut self) -> MarkerObserver<S> {
            while let Some(batch) = self.batches.recv().await {
                self.observer.handle_batch(&batch);
            }
            self.observer
        }
    }
}
