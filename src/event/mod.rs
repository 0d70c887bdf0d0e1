//! Chat highlight event model
//!
//! Strongly typed representation of the loosely shaped payloads published by
//! the chat client. [`decode`] is the only place where the external shape is
//! turned into an [`Event`].

pub mod decode;

pub use decode::{decode, DecodeError};

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Declared event kind, derived from the payload's type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Highlight in a public channel (nick mention or highlight rule)
    Channel,
    /// Highlight in a private message or query window
    Private,
    /// Missing or unrecognized type discriminator
    Unknown,
}

impl EventKind {
    /// Map a declared type string to a kind. Matching is exact.
    pub fn from_declared(declared: Option<&str>) -> Self {
        match declared {
            Some("channel") => EventKind::Channel,
            Some("private") => EventKind::Private,
            _ => EventKind::Unknown,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Channel => "channel",
            EventKind::Private => "private",
            EventKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A decoded highlight event
///
/// Created per delivery and dropped once the delivery has been acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    /// Raw type discriminator as received, kept for diagnostics
    pub declared_type: Option<String>,
    pub server: Option<String>,
    pub channel: Option<String>,
    /// Always present for [`EventKind::Channel`] and [`EventKind::Private`]
    pub message: Option<String>,
    pub tags: BTreeSet<String>,
}

impl Event {
    /// Check whether the event carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Server name, empty when the publisher omitted it
    pub fn server_or_empty(&self) -> &str {
        self.server.as_deref().unwrap_or("")
    }

    /// Channel or query name, empty when the publisher omitted it
    pub fn channel_or_empty(&self) -> &str {
        self.channel.as_deref().unwrap_or("")
    }

    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// Rendered desktop notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new<T: Into<String>, B: Into<String>>(title: T, body: B) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}
