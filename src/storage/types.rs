use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Format version written into every item.
pub const ITEM_VERSION: u32 = 1;

/// Options attached to a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Time to live. `None` keeps the item until it is deleted.
    pub ttl: Option<Duration>,
    /// Content type echoed back on reads.
    pub content_type: Option<String>,
}

/// A value as kept by the storage collaborator.
///
/// `etag` is a content hash of the raw payload, so two writes of identical
/// bytes always carry the same etag. `timestamp` is the write time in
/// milliseconds since the epoch and backs the `Last-Modified` header.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub version: u32,
    pub timestamp: u64,
    pub payload: Bytes,
    pub content_type: Option<String>,
    pub etag: String,
    pub ttl: Option<Duration>,
}

impl StoredItem {
    /// Build a fresh item stamped with the current time.
    pub fn new(payload: Bytes, options: WriteOptions) -> Self {
        Self {
            version: ITEM_VERSION,
            timestamp: now_ms(),
            etag: Self::etag_for(&payload),
            payload,
            content_type: options.content_type,
            ttl: options.ttl,
        }
    }

    /// Hex content hash of `payload`.
    pub fn etag_for(payload: &[u8]) -> String {
        blake3::hash(payload).to_hex().to_string()
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.ttl
            .map(|ttl| {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                self.timestamp.saturating_add(millis)
            })
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at().is_some_and(|deadline| now >= deadline)
    }

    /// The write time as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
    pub fn last_modified(&self) -> String {
        http_date(self.timestamp)
    }
}

pub fn http_date(timestamp_ms: u64) -> String {
    let when = DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64).unwrap_or_default();
    when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date back into milliseconds since the epoch.
pub fn parse_http_date(value: &str) -> Option<u64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|when| when.timestamp_millis().max(0) as u64)
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
