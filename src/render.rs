//! Parent-side render decisions for the dashboard pane.

use serde_json::Value;
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::message::decode_message;

/// Default `title` attribute of the embedded dashboard frame.
pub const DEFAULT_FRAME_TITLE: &str = "Evidence Dashboard";

/// What the parent knows about the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenderState {
    /// Nothing discovered yet; show the placeholder.
    #[default]
    Unknown,
    Known(Endpoint),
}

impl RenderState {
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            RenderState::Unknown => None,
            RenderState::Known(endpoint) => Some(endpoint),
        }
    }
}

/// The single piece of state the mount controller owns.
///
/// There is no transition back to [`RenderState::Unknown`]: the protocol has
/// no "dashboard gone" signal.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    state: RenderState,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Feed one message from the shared channel. Foreign or malformed
    /// messages are ignored. Returns `true` when the known endpoint changed.
    pub fn apply_message(&mut self, data: &Value) -> bool {
        match decode_message(data) {
            Some(endpoint) => self.replace(endpoint),
            None => {
                debug!("ignoring message that is not a dashboard notification");
                false
            }
        }
    }

    /// Unconditional replacement by the newest endpoint.
    pub fn replace(&mut self, endpoint: Endpoint) -> bool {
        if self.state.endpoint() == Some(&endpoint) {
            return false;
        }
        info!(url = %endpoint.url(), "dashboard endpoint updated");
        self.state = RenderState::Known(endpoint);
        true
    }

    pub fn view(&self, title: &str) -> DashboardView {
        DashboardView::from_state(&self.state, title)
    }
}

/// A frame to mount. `key` is the frame's identity: a different key means a
/// fresh frame instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    pub key: String,
    pub src: String,
    pub title: String,
}

/// What the dashboard pane should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    Placeholder,
    Frame(FrameSpec),
}

impl DashboardView {
    pub fn from_state(state: &RenderState, title: &str) -> Self {
        match state {
            RenderState::Unknown => DashboardView::Placeholder,
            RenderState::Known(endpoint) => DashboardView::Frame(FrameSpec {
                key: endpoint.key(),
                src: endpoint.url(),
                title: title.to_string(),
            }),
        }
    }
}

/// Outcome of reconciling a view against what is currently mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderAction {
    ShowPlaceholder,
    /// Create a fresh frame instance, dropping any previous one.
    Mount(FrameSpec),
    Unchanged,
}

/// Tracks the mounted frame's key so a changed endpoint always yields a new
/// instance instead of navigating the old one.
#[derive(Debug, Default)]
pub struct FrameSlot {
    mounted: Option<String>,
    showing_placeholder: bool,
    instances: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(&mut self, view: &DashboardView) -> RenderAction {
        match view {
            DashboardView::Placeholder => {
                if self.showing_placeholder {
                    return RenderAction::Unchanged;
                }
                self.mounted = None;
                self.showing_placeholder = true;
                RenderAction::ShowPlaceholder
            }
            DashboardView::Frame(spec) => {
                if self.mounted.as_deref() == Some(spec.key.as_str()) {
                    return RenderAction::Unchanged;
                }
                self.mounted = Some(spec.key.clone());
                self.showing_placeholder = false;
                self.instances += 1;
                RenderAction::Mount(spec.clone())
            }
        }
    }

    pub fn mounted_key(&self) -> Option<&str> {
        self.mounted.as_deref()
    }

    /// Frame instances created over the slot's lifetime.
    pub fn instances(&self) -> u64 {
        self.instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_view_is_placeholder() {
        let state = DashboardState::new();
        assert_eq!(state.state(), &RenderState::Unknown);
        assert_eq!(state.view(DEFAULT_FRAME_TITLE), DashboardView::Placeholder);
    }

    #[test]
    fn test_valid_message_yields_keyed_frame() {
        let mut state = DashboardState::new();
        assert!(state.apply_message(&json!({"type": "DASHBOARD_PORT", "host": "10.0.0.5", "port": 8050})));
        assert_eq!(
            state.view("Dash"),
            DashboardView::Frame(FrameSpec {
                key: "10.0.0.5:8050".into(),
                src: "http://10.0.0.5:8050".into(),
                title: "Dash".into(),
            })
        );
    }

    #[test]
    fn test_malformed_messages_leave_state_unchanged() {
        let mut state = DashboardState::new();
        assert!(!state.apply_message(&json!({"type": "OTHER"})));
        assert!(!state.apply_message(&json!({"type": "DASHBOARD_PORT", "port": 0})));
        assert_eq!(state.state(), &RenderState::Unknown);

        state.apply_message(&json!({"type": "DASHBOARD_PORT", "port": 9000}));
        assert!(!state.apply_message(&json!({"type": "DASHBOARD_PORT", "port": 0})));
        assert_eq!(state.state().endpoint().map(|e| e.port()), Some(9000));
    }

    #[test]
    fn test_same_endpoint_is_not_a_change() {
        let mut state = DashboardState::new();
        assert!(state.apply_message(&json!({"type": "DASHBOARD_PORT", "port": 9000})));
        assert!(!state.apply_message(&json!({"type": "DASHBOARD_PORT", "port": 9000})));
    }

    #[test]
    fn test_newest_endpoint_wins() {
        let mut state = DashboardState::new();
        state.apply_message(&json!({"type": "DASHBOARD_PORT", "port": 9000}));
        state.apply_message(&json!({"type": "DASHBOARD_PORT", "host": "10.0.0.5", "port": 8050}));
        assert_eq!(state.state().endpoint().unwrap().key(), "10.0.0.5:8050");
    }

    #[test]
    fn test_frame_slot_remounts_on_key_change_only() {
        let mut slot = FrameSlot::new();
        let mut state = DashboardState::new();
        assert_eq!(slot.reconcile(&state.view("t")), RenderAction::ShowPlaceholder);
        assert_eq!(slot.reconcile(&state.view("t")), RenderAction::Unchanged);

        state.replace(Endpoint::port_only(9000).unwrap());
        assert!(matches!(slot.reconcile(&state.view("t")), RenderAction::Mount(_)));
        assert_eq!(slot.reconcile(&state.view("t")), RenderAction::Unchanged);

        state.replace(Endpoint::port_only(9100).unwrap());
        match slot.reconcile(&state.view("t")) {
            RenderAction::Mount(spec) => assert_eq!(spec.src, "http://localhost:9100"),
            other => panic!("expected a fresh mount, got {other:?}"),
        }
        assert_eq!(slot.instances(), 2);
        assert_eq!(slot.mounted_key(), Some("localhost:9100"));
    }
}
