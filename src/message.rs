//! Cross-frame message contract.
//!
//! Outgoing: [`Notification`], serialized as `{type: "DASHBOARD_PORT", host?, port}`.
//! Incoming: anything at all may arrive on the shared channel, so
//! [`decode_message`] runs a tagged decode and validates the endpoint before
//! anything downstream sees it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoint::{Endpoint, EndpointVariant};

/// Discriminator carried in the `type` field.
pub const MESSAGE_TYPE: &str = "DASHBOARD_PORT";

/// Message posted to the parent frame when a new endpoint is discovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "DASHBOARD_PORT")]
    DashboardPort {
        #[serde(skip_serializing_if = "Option::is_none")]
        host: Option<String>,
        port: u16,
    },
}

impl Notification {
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        let host = match endpoint.variant() {
            EndpointVariant::HostPort => Some(endpoint.host().to_string()),
            EndpointVariant::PortOnly => None,
        };
        Notification::DashboardPort { host, port: endpoint.port() }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Shape of whatever arrives on the channel, before validation.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum InboundMessage {
    #[serde(rename = "DASHBOARD_PORT")]
    DashboardPort {
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<f64>,
    },
    #[serde(other)]
    Other,
}

/// Decode a channel message into an endpoint.
///
/// `None` for foreign types, missing/zero/fractional/out-of-range ports, an
/// empty `host`, or any payload that is not an object with a `type` field.
/// A `null` host is read as the port-only form.
pub fn decode_message(data: &Value) -> Option<Endpoint> {
    let msg: InboundMessage = serde_json::from_value(data.clone()).ok()?;
    match msg {
        InboundMessage::DashboardPort { host, port } => {
            let port = port_from_number(port?)?;
            match host {
                Some(host) => Endpoint::with_host(host, port),
                None => Endpoint::port_only(port),
            }
        }
        InboundMessage::Other => None,
    }
}

/// JS numbers cross the frame boundary as doubles.
fn port_from_number(n: f64) -> Option<u16> {
    if !n.is_finite() || n.fract() != 0.0 || n < 1.0 || n > f64::from(u16::MAX) {
        return None;
    }
    Some(n as u16)
}
