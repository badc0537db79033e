//! Envelope carried on every bus topic

use serde::{Deserialize, Serialize};

/// Standard bus message format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusMessage {
    /// Topic name
    pub topic: String,

    /// Message content (JSON)
    pub content: serde_json::Value,

    /// Name of the publishing node
    pub from: String,
}

impl BusMessage {
    /// Create a new bus message
    pub fn new(
        topic: impl Into<String>,
        content: serde_json::Value,
        from: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            content,
            from: from.into(),
        }
    }
}
