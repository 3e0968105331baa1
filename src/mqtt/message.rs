//! Inbound message representation
//!
//! Payloads are copied into a fixed-size buffer with an explicit length. Anything beyond
//! [`PAYLOAD_CAPACITY`] bytes is cut off before the dispatcher sees it, so an oversized
//! message can at worst fail to match a command.

use std::fmt;

pub const PAYLOAD_CAPACITY: usize = 50;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    bytes: [u8; PAYLOAD_CAPACITY],
    len: usize,
    truncated: bool,
}

impl Payload {
    pub fn truncated(raw: &[u8]) -> Self {
        let len = raw.len().min(PAYLOAD_CAPACITY);
        let mut bytes = [0u8; PAYLOAD_CAPACITY];
        bytes[..len].copy_from_slice(&raw[..len]);
        Self {
            bytes,
            len,
            truncated: raw.len() > PAYLOAD_CAPACITY,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the original payload was longer than the buffer
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Exact, case-sensitive comparison
    pub fn matches(&self, text: &str) -> bool {
        self.as_bytes() == text.as_bytes()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))?;
        if self.truncated {
            write!(f, " (truncated)")?;
        }
        Ok(())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Payload,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, raw: &[u8]) -> Self {
        Self {
            topic: topic.into(),
            payload: Payload::truncated(raw),
        }
    }
}
