//! Tagged events written to the worker's input pipe
//!
//! Wire format: `<tag> <unix-seconds> <payload>\n`. The payload is the line
//! exactly as read, with no escaping.

use std::fmt;

use crate::line::Line;

/// Where a forwarded line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Inbound from the remote peer
    Inbound,
    /// Written by a user into the FIFO
    User,
    /// Synthesized from a received signal
    Signal,
}

impl Tag {
    pub fn as_char(self) -> char {
        match self {
            Tag::Inbound => 'i',
            Tag::User => 'u',
            Tag::Signal => 's',
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A line annotated with its source and arrival time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub tag: Tag,
    pub timestamp: i64,
    pub payload: Line,
}

impl TaggedEvent {
    pub fn new(tag: Tag, timestamp: i64, payload: Line) -> Self {
        Self {
            tag,
            timestamp,
            payload,
        }
    }

    /// Tag `payload` with the current wall-clock time
    pub fn now(tag: Tag, payload: Line) -> Self {
        Self::new(tag, chrono::Utc::now().timestamp(), payload)
    }

    /// Encode for the worker's input pipe, terminator included
    pub fn encode(&self) -> Vec<u8> {
        let header = format!("{} {} ", self.tag, self.timestamp);
        let mut out = Vec::with_capacity(header.len() + self.payload.len() + 1);
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(self.payload.as_bytes());
        out.push(b'\n');
        out
    }
}
