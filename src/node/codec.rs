//! Newline-delimited key stream encoding.
//!
//! Every key is written as its UTF-8 bytes followed by `\n`. Keys with a
//! line break are rejected before they are stored.

use bytes::{Buf, Bytes, BytesMut};

pub fn encode_key(key: &str) -> Bytes {
    let mut line = BytesMut::with_capacity(key.len() + 1);
    line.extend_from_slice(key.as_bytes());
    line.extend_from_slice(b"\n");
    line.freeze()
}

/// Incremental decoder for a key stream arriving in arbitrary chunks.
#[derive(Debug, Default)]
pub struct KeyLineDecoder {
    buffer: BytesMut,
}

impl KeyLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every key completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut keys = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(end);
            self.buffer.advance(1);
            if !line.is_empty() {
                keys.push(String::from_utf8_lossy(&line).into_owned());
            }
        }
        keys
    }

    /// The trailing key of a stream whose last line lacked a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
