//! Types for meeting participants.

use serde::{Deserialize, Serialize};

/// A remote participant the agent can address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique, addressable identity (what RPCs are sent to)
    pub identity: String,
    /// Human-readable display name (what people call each other)
    pub name: String,
}

impl Participant {
    pub fn new(identity: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: name.into(),
        }
    }

    /// Name to use when talking about this participant.
    /// Falls back to the identity when no display name was set.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.identity
        } else {
            &self.name
        }
    }
}
