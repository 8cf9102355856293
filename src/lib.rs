//! Cross-frame discovery of a dashboard endpoint announced inside a chat
//! transcript.
//!
//! The chat frame renders a marker such as `<!--DASHBOARD:10.0.0.5:8050-->`
//! or `<!--DASHBOARD_PORT:9000-->`. A [`MarkerObserver`] inside that frame
//! watches the document, decodes the marker, drops repeats and posts a
//! [`Notification`] to the parent window. In the parent, the mount controller
//! validates incoming messages and switches the dashboard pane from a
//! placeholder to a frame keyed on the endpoint.

pub mod endpoint;
pub mod feed;
pub mod marker;
pub mod message;
pub mod observer;
pub mod render;

#[cfg(not(target_arch = "wasm32"))]
pub mod bus;
#[cfg(not(target_arch = "wasm32"))]
pub mod cli;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod document;
#[cfg(not(target_arch = "wasm32"))]
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod mount;
#[cfg(not(target_arch = "wasm32"))]
pub mod web;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm;

pub use endpoint::{Endpoint, EndpointVariant};
pub use feed::{DocumentNode, Mutation, NodeKind, NotificationSink, ReadyState, RecordingSink};
pub use marker::decode_marker;
pub use message::{decode_message, Notification, MESSAGE_TYPE};
pub use observer::MarkerObserver;
pub use render::{DashboardState, DashboardView, FrameSlot, FrameSpec, RenderAction, RenderState};

#[cfg(not(target_arch = "wasm32"))]
pub use bus::{MessageBus, ParentSink};
#[cfg(not(target_arch = "wasm32"))]
pub use document::{MemoryDocument, NodeRef};
#[cfg(not(target_arch = "wasm32"))]
pub use error::RelayError;
#[cfg(not(target_arch = "wasm32"))]
pub use mount::{MountController, MountHandle};
#[cfg(not(target_arch = "wasm32"))]
pub use observer::{AttachedObserver, ChangeFeed};
