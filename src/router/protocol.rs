//! HTTP Protocol
//!
//! Header names, query flags and fixed bodies shared by the request router
//! and by `RemoteNode`, which speaks the same API to other members.

use axum::http::HeaderMap;
use serde::Deserialize;
use std::time::Duration;

// --- Endpoints ---

/// Liveness probe.
pub const ENDPOINT_PING: &str = "/ping";
/// Fixed body of the liveness probe.
pub const PING_BODY: &str = "pong";

// --- Headers ---

/// Time to live of a write, in whole seconds.
pub const HEADER_TTL: &str = "x-scurry-ttl";
/// Set on relayed requests to the id of the relaying member.
///
/// A member receiving it serves the request itself instead of relaying again.
pub const HEADER_RELAYED_BY: &str = "x-scurry-relayed-by";

// --- Content types ---

/// Content type assumed for items written without one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
/// Content type of newline-delimited key listings.
pub const KEYS_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Query string of `GET /:bucket`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `true` asks for this member's keys only, without fan-out.
    #[serde(default)]
    pub keys: bool,
}

/// Query string asking a member for its local key listing.
pub const LOCAL_KEYS_QUERY: &str = "keys=true";

/// The TTL carried by a request, if present and numeric. `0` means no TTL.
pub fn parse_ttl(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(HEADER_TTL)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_ttl() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_ttl(&headers), None);

        headers.insert(HEADER_TTL, HeaderValue::from_static("30"));
        assert_eq!(parse_ttl(&headers), Some(Duration::from_secs(30)));

        headers.insert(HEADER_TTL, HeaderValue::from_static("soon"));
        assert_eq!(parse_ttl(&headers), None);

        headers.insert(HEADER_TTL, HeaderValue::from_static("0"));
        assert_eq!(parse_ttl(&headers), None);
    }
}
