//! Broadcast events
//!
//! The unit of work travelling through the intake queue. Payload text is
//! rendered once at construction; the dispatcher only copies it.

use crate::types::Identity;

/// One submitted event, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    /// Identity that caused the event (author, or the user who joined/left)
    pub sender: Identity,
    /// Rendered wire payload
    pub content: String,
    /// System events reach every subscriber, including `sender`
    pub is_system: bool,
}

impl BroadcastEvent {
    /// `** User [name] joined the chat **`
    pub fn joined(identity: Identity) -> Self {
        let content = format!("** User [{}] joined the chat **", identity);
        Self {
            sender: identity,
            content,
            is_system: true,
        }
    }

    /// `** User [name] left the chat **`
    pub fn left(identity: Identity) -> Self {
        let content = format!("** User [{}] left the chat **", identity);
        Self {
            sender: identity,
            content,
            is_system: true,
        }
    }

    /// `[sender]: content`
    pub fn chat(sender: Identity, content: &str) -> Self {
        let content = format!("[{}]: {}", sender, content);
        Self {
            sender,
            content,
            is_system: false,
        }
    }

    /// Roster announcement that trails every system event
    pub fn current_users<'a>(identities: impl IntoIterator<Item = &'a Identity>) -> String {
        let names: Vec<&str> = identities.into_iter().map(Identity::as_str).collect();
        format!("** Current users in chat: {} **", names.join(", "))
    }
}
