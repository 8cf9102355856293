//! In-memory document used as a synthetic change feed.
//!
//! Mirrors the parts of the browser DOM the observer relies on: element and
//! text nodes, `textContent`, mutation records for the `body` subtree
//! delivered in batches, and a loading phase that ends with the initial
//! parse. Mutations queue per observer until [`MemoryDocument::flush`], the
//! way the browser queues records until the next microtask checkpoint.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};

use crate::feed::{DocumentNode, Mutation, NodeKind, ReadyState};
use crate::observer::ChangeFeed;

type Batch = Vec<Mutation<NodeRef>>;

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    tag: Option<String>,
    /// Character data for text and comment nodes.
    data: String,
    parent: Option<usize>,
    children: Vec<usize>,
}

struct Recorder {
    pending: Batch,
    tx: mpsc::UnboundedSender<Batch>,
}

struct Tree {
    nodes: Vec<NodeData>,
    root: usize,
    body: usize,
    recorders: Vec<Recorder>,
    ready: watch::Sender<ReadyState>,
}

impl Tree {
    fn push(&mut self, kind: NodeKind, tag: Option<&str>, data: &str) -> usize {
        self.nodes.push(NodeData {
            kind,
            tag: tag.map(str::to_string),
            data: data.to_string(),
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: usize, child: usize) {
        if let Some(old) = self.nodes[child].parent.take() {
            self.nodes[old].children.retain(|&c| c != child);
        }
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Whether `id` sits inside the observed `body` subtree.
    fn is_observed(&self, mut id: usize) -> bool {
        loop {
            if id == self.body {
                return true;
            }
            match self.nodes[id].parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn record(&mut self, mutation: Mutation<NodeRef>) {
        for recorder in &mut self.recorders {
            recorder.pending.push(mutation.clone());
        }
    }

    fn text_of(&self, id: usize, out: &mut String) {
        let node = &self.nodes[id];
        match node.kind {
            NodeKind::Text => out.push_str(&node.data),
            NodeKind::Element => {
                for &child in &node.children {
                    self.text_of(child, out);
                }
            }
            NodeKind::Other => {}
        }
    }

    fn elements_below(&self, id: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[id].children {
            if self.nodes[child].kind == NodeKind::Element {
                out.push(child);
                self.elements_below(child, out);
            }
        }
    }
}

fn lock(tree: &Mutex<Tree>) -> MutexGuard<'_, Tree> {
    tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a node in a [`MemoryDocument`].
#[derive(Clone)]
pub struct NodeRef {
    tree: Arc<Mutex<Tree>>,
    id: usize,
}

impl NodeRef {
    pub fn tag(&self) -> Option<String> {
        lock(&self.tree).nodes[self.id].tag.clone()
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeRef({})", self.id)
    }
}

impl DocumentNode for NodeRef {
    fn kind(&self) -> NodeKind {
        lock(&self.tree).nodes[self.id].kind
    }

    fn text_content(&self) -> Option<String> {
        let tree = lock(&self.tree);
        let node = &tree.nodes[self.id];
        match node.kind {
            NodeKind::Element => {
                let mut text = String::new();
                tree.text_of(self.id, &mut text);
                Some(text)
            }
            NodeKind::Text | NodeKind::Other => Some(node.data.clone()),
        }
    }

    fn parent_element(&self) -> Option<Self> {
        let tree = lock(&self.tree);
        let parent = tree.nodes[self.id].parent?;
        (tree.nodes[parent].kind == NodeKind::Element)
            .then(|| NodeRef { tree: Arc::clone(&self.tree), id: parent })
    }

    fn descendant_elements(&self) -> Vec<Self> {
        let tree = lock(&self.tree);
        let mut ids = Vec::new();
        tree.elements_below(self.id, &mut ids);
        ids.into_iter()
            .map(|id| NodeRef { tree: Arc::clone(&self.tree), id })
            .collect()
    }
}

/// A minimal `<html><head/><body/></html>` document.
#[derive(Clone)]
pub struct MemoryDocument {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryDocument {
    /// A document whose initial parse has already finished.
    pub fn new() -> Self {
        Self::with_state(ReadyState::Interactive)
    }

    /// A document still in its loading phase; call [`finish_parsing`](Self::finish_parsing).
    pub fn loading() -> Self {
        Self::with_state(ReadyState::Loading)
    }

    fn with_state(state: ReadyState) -> Self {
        let (ready, _) = watch::channel(state);
        let mut tree = Tree { nodes: Vec::new(), root: 0, body: 0, recorders: Vec::new(), ready };
        let root = tree.push(NodeKind::Element, Some("html"), "");
        let head = tree.push(NodeKind::Element, Some("head"), "");
        let body = tree.push(NodeKind::Element, Some("body"), "");
        tree.attach(root, head);
        tree.attach(root, body);
        tree.root = root;
        tree.body = body;
        MemoryDocument { tree: Arc::new(Mutex::new(tree)) }
    }

    fn node(&self, id: usize) -> NodeRef {
        NodeRef { tree: Arc::clone(&self.tree), id }
    }

    pub fn body(&self) -> NodeRef {
        let body = lock(&self.tree).body;
        self.node(body)
    }

    /// End the loading phase (`DOMContentLoaded`).
    pub fn finish_parsing(&self) {
        lock(&self.tree).ready.send_replace(ReadyState::Interactive);
    }

    pub fn create_element(&self, tag: &str) -> NodeRef {
        let id = lock(&self.tree).push(NodeKind::Element, Some(tag), "");
        self.node(id)
    }

    pub fn create_text(&self, text: &str) -> NodeRef {
        let id = lock(&self.tree).push(NodeKind::Text, None, text);
        self.node(id)
    }

    pub fn create_comment(&self, text: &str) -> NodeRef {
        let id = lock(&self.tree).push(NodeKind::Other, None, text);
        self.node(id)
    }

    /// Append `child` (moving it if already attached). Recorded when the
    /// parent is inside `body`.
    pub fn append_child(&self, parent: &NodeRef, child: &NodeRef) {
        let mut tree = lock(&self.tree);
        tree.attach(parent.id, child.id);
        if tree.is_observed(parent.id) {
            tree.record(Mutation::NodesAdded(vec![child.clone()]));
        }
    }

    /// Detach `node`. Removals are never reported.
    pub fn remove(&self, node: &NodeRef) {
        let mut tree = lock(&self.tree);
        if let Some(parent) = tree.nodes[node.id].parent.take() {
            tree.nodes[parent].children.retain(|&c| c != node.id);
        }
    }

    /// Replace the data of a text node in place.
    pub fn set_text(&self, node: &NodeRef, text: &str) {
        let mut tree = lock(&self.tree);
        if tree.nodes[node.id].kind == NodeKind::Element {
            return;
        }
        tree.nodes[node.id].data = text.to_string();
        if tree.is_observed(node.id) {
            tree.record(Mutation::TextChanged(node.clone()));
        }
    }

    /// Build `<div><p>text</p></div>` detached, then insert it under `body`
    /// in one step. Returns the text node.
    pub fn append_message(&self, text: &str) -> NodeRef {
        let wrapper = self.create_element("div");
        let para = self.create_element("p");
        let node = self.create_text(text);
        self.append_child(&para, &node);
        self.append_child(&wrapper, &para);
        self.append_child(&self.body(), &wrapper);
        node
    }

    /// Deliver queued records, one batch per observer.
    pub fn flush(&self) {
        let mut tree = lock(&self.tree);
        tree.recorders.retain_mut(|recorder| {
            if recorder.pending.is_empty() {
                return !recorder.tx.is_closed();
            }
            let batch = std::mem::take(&mut recorder.pending);
            recorder.tx.send(batch).is_ok()
        });
    }

    /// Flush, then disconnect every observer.
    pub fn close(&self) {
        self.flush();
        lock(&self.tree).recorders.clear();
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for MemoryDocument {
    type Node = NodeRef;

    fn ready_state(&self) -> watch::Receiver<ReadyState> {
        lock(&self.tree).ready.subscribe()
    }

    fn observe(&self) -> mpsc::UnboundedReceiver<Batch> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.tree).recorders.push(Recorder { pending: Vec::new(), tx });
        rx
    }

    fn all_elements(&self) -> Vec<NodeRef> {
        let tree = lock(&self.tree);
        let mut ids = vec![tree.root];
        tree.elements_below(tree.root, &mut ids);
        drop(tree);
        ids.into_iter().map(|id| self.node(id)).collect()
    }
}
