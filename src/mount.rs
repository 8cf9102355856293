//! # Dashboard Mount Controller
//!
//! Listens on the parent window's message channel for the lifetime of the
//! dashboard pane and publishes the derived [`RenderState`]. Unmounting stops
//! the listener before returning; the published state never changes after.

use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::bus::MessageBus;
use crate::render::{DashboardState, DashboardView, RenderState, DEFAULT_FRAME_TITLE};

/// Factory for mounted dashboard panes.
#[derive(Debug, Clone)]
pub struct MountController {
    title: String,
}

impl MountController {
    pub fn new() -> Self {
        MountController { title: DEFAULT_FRAME_TITLE.to_string() }
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        MountController { title: title.into() }
    }

    /// Subscribe to `bus` and start deriving render state. The subscription is
    /// in place when this returns, so nothing posted afterwards is missed.
    /// Must be called inside a tokio runtime.
    pub fn mount(&self, bus: &MessageBus) -> MountHandle {
        let messages = UnboundedReceiverStream::new(bus.subscribe());
        let (state_tx, state_rx) = watch::channel(RenderState::Unknown);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(listen(messages, state_tx, stop_rx));
        MountHandle { state: state_rx, title: self.title.clone(), stop: stop_tx, task }
    }
}

impl Default for MountController {
    fn default() -> Self {
        Self::new()
    }
}

async fn listen(
    mut messages: UnboundedReceiverStream<Value>,
    state_tx: watch::Sender<RenderState>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut dashboard = DashboardState::new();
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            next = messages.next() => match next {
                Some(data) => {
                    if dashboard.apply_message(&data) {
                        state_tx.send_replace(dashboard.state().clone());
                    }
                }
                None => break,
            },
        }
    }
    debug!("dashboard message listener removed");
}

/// A mounted dashboard pane. Dropping it also removes the listener.
pub struct MountHandle {
    state: watch::Receiver<RenderState>,
    title: String,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MountHandle {
    pub fn state(&self) -> RenderState {
        self.state.borrow().clone()
    }

    pub fn view(&self) -> DashboardView {
        DashboardView::from_state(&self.state.borrow(), &self.title)
    }

    /// Independent receiver for a render layer.
    pub fn subscribe_state(&self) -> watch::Receiver<RenderState> {
        self.state.clone()
    }

    /// Wait for the next state transition. `None` once unmounted.
    pub async fn changed(&mut self) -> Option<RenderState> {
        self.state.changed().await.ok()?;
        let state = self.state.borrow_and_update().clone();
        Some(state)
    }

    /// Remove the listener and wait until it has stopped.
    pub async fn unmount(self) {
        let MountHandle { stop, task, .. } = self;
        let _ = stop.send(());
        if let Err(e) = task.await {
            if e.is_panic() {
                warn!("dashboard message listener panicked");
            }
        }
    }
}
