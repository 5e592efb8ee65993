//! # Conversation Identity
//!
//! A conversation starts life with a client-made placeholder id and is
//! promoted to the backend's id the first time a streamed record carries one.
//!
//! ```text
//! Temporary("temp-…") ──promote(server_id)──▶ Assigned(server_id)
//!                                              (terminal; promote is a no-op)
//! ```

use std::fmt;

/// Prefix reserved for client-generated ids.
pub const TEMP_PREFIX: &str = "temp";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationId {
    /// Placeholder used before the backend has created the conversation.
    Temporary(String),
    /// Id issued by the backend.
    Assigned(String),
}

impl ConversationId {
    /// A fresh placeholder id.
    pub fn temporary() -> Self {
        ConversationId::Temporary(format!("{TEMP_PREFIX}-{}", uuid::Uuid::new_v4()))
    }

    /// Classifies an externally supplied id (CLI flag, saved state).
    /// Blank input has no conversation at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else if raw.starts_with(TEMP_PREFIX) {
            Some(ConversationId::Temporary(raw.to_string()))
        } else {
            Some(ConversationId::Assigned(raw.to_string()))
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, ConversationId::Temporary(_))
    }

    /// The id to put on the wire: only server-assigned ids are sent.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            ConversationId::Assigned(id) => Some(id),
            ConversationId::Temporary(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConversationId::Temporary(id) | ConversationId::Assigned(id) => id,
        }
    }

    /// Replaces a placeholder with the backend's id. Returns true if this call
    /// performed the promotion; an already assigned id (or a blank server id)
    /// is left untouched.
    pub fn promote(&mut self, server_id: &str) -> bool {
        if !self.is_temporary() || server_id.is_empty() {
            return false;
        }
        *self = ConversationId::Assigned(server_id.to_string());
        true
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
