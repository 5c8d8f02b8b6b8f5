// ABOUTME: Transport-facing types shared by the bot core and room transports
// ABOUTME: ChatUser, IncomingMessage, and the fire-and-forget RoomSink trait

use chrono::{DateTime, Utc};
use std::fmt::Debug;

// =============================================================================
// User Identity
// =============================================================================

/// Identity of a room member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatUser {
    /// Unique identifier (e.g., @user:matrix.org)
    pub id: String,
    /// Display name
    pub display_name: Option<String>,
}

impl ChatUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(name.into()),
        }
    }
}

/// Does `s` look like a federated identity (`@local:domain`)?
pub fn looks_like_identity(s: &str) -> bool {
    s.starts_with('@') && s.contains(':')
}

// =============================================================================
// Incoming Message
// =============================================================================

/// A plain-text message that arrived in the room
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// The user who sent the message
    pub sender: ChatUser,
    /// Room-relative event ID
    pub event_id: String,
    /// Timestamp in seconds since Unix epoch
    pub timestamp: i64,
    /// Plain-text body
    pub body: String,
}

impl IncomingMessage {
    pub fn new(
        sender: ChatUser,
        event_id: impl Into<String>,
        timestamp: i64,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            event_id: event_id.into(),
            timestamp,
            body: body.into(),
        }
    }

    /// Timestamp as a UTC datetime (epoch on out-of-range values)
    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }
}

// =============================================================================
// Outgoing
// =============================================================================

/// Where the bot posts its messages.
///
/// Posting is fire-and-forget: implementations queue the text and return
/// immediately, delivery failures are the transport's business.
pub trait RoomSink: Send + Sync + Debug {
    /// Post one plain-text message to the room
    fn post_plain_text(&self, text: String);
}
