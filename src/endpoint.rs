//! The discovered dashboard address.
//!
//! Two marker revisions are in circulation: one carries `host:port`, the older
//! one only a port (host implied to be `localhost`). Both decode into the same
//! [`Endpoint`] type; the variant is remembered only so the outgoing message
//! keeps the shape the marker used.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU16;

/// Host used when a marker or message carries only a port.
pub const IMPLICIT_HOST: &str = "localhost";

/// Which marker/message revision an [`Endpoint`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointVariant {
    /// `<!--DASHBOARD:<host>:<port>-->` / `{type, host, port}`
    HostPort,
    /// `<!--DASHBOARD_PORT:<port>-->` / `{type, port}`
    PortOnly,
}

/// A validated dashboard address.
///
/// Equality and hashing use the canonical key (`host:port` with the implicit
/// host filled in), so `DASHBOARD:localhost:9000` and `DASHBOARD_PORT:9000`
/// name the same endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    host: String,
    port: NonZeroU16,
    variant: EndpointVariant,
}

impl Endpoint {
    /// Variant A. Returns `None` for an empty host or a zero port.
    pub fn with_host(host: impl Into<String>, port: u16) -> Option<Self> {
        let host = host.into();
        if host.is_empty() {
            return None;
        }
        Some(Endpoint {
            host,
            port: NonZeroU16::new(port)?,
            variant: EndpointVariant::HostPort,
        })
    }

    /// Variant B. Returns `None` for a zero port.
    pub fn port_only(port: u16) -> Option<Self> {
        Some(Endpoint {
            host: IMPLICIT_HOST.to_string(),
            port: NonZeroU16::new(port)?,
            variant: EndpointVariant::PortOnly,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port.get()
    }

    pub fn variant(&self) -> EndpointVariant {
        self.variant
    }

    /// Canonical key used for duplicate suppression and frame identity.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address the embedded dashboard frame is pointed at.
    pub fn url(&self) -> String {
        format!("http://{}", self.key())
    }

    /// Marker text an emitter renders into the chat transcript.
    pub fn marker(&self) -> String {
        match self.variant {
            EndpointVariant::HostPort => format!("<!--DASHBOARD:{}:{}-->", self.host, self.port),
            EndpointVariant::PortOnly => format!("<!--DASHBOARD_PORT:{}-->", self.port),
        }
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
