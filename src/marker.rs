//! Marker detection in rendered transcript text.
//!
//! Only the first marker in a piece of text is considered. If that marker
//! fails validation the text is treated as carrying no marker at all.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::endpoint::Endpoint;

/// `<!--DASHBOARD:<host>:<port>-->` or `<!--DASHBOARD_PORT:<port>-->`.
///
/// A host never contains `:`, `<`, `>` or whitespace, so it cannot run across
/// the end of one comment into the next marker. `[0-9]` rather than `\d`: the
/// Unicode digit class would admit ports the integer parse then rejects.
static MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!--DASHBOARD(?::([^:<>\s]+):([0-9]+)|_PORT:([0-9]+))-->")
        .expect("marker pattern is a valid regex")
});

/// Decode the first marker in `text`, if any.
///
/// Returns `None` when there is no marker, when the host is empty, or when
/// the port is zero or does not fit a TCP port.
pub fn decode_marker(text: &str) -> Option<Endpoint> {
    let caps = MARKER_PATTERN.captures(text)?;
    if let (Some(host), Some(port)) = (caps.get(1), caps.get(2)) {
        let port = port.as_str().parse::<u16>().ok()?;
        return Endpoint::with_host(host.as_str(), port);
    }
    let port = caps.get(3)?.as_str().parse::<u16>().ok()?;
    Endpoint::port_only(port)
}

/// Cheap pre-check used before allocating node text.
pub fn may_contain_marker(text: &str) -> bool {
    text.contains("<!--DASHBOARD")
}
