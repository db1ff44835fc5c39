//! Conversation history with a token budget
//!
//! The history is shared execution state: both executors read it for
//! context and append to it as the conversation advances. It is bounded by
//! an estimated token budget; once over budget the oldest entries are
//! evicted, except a leading system entry which anchors the conversation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::estimate_tokens;

/// Who produced a history entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token-budgeted message history
pub struct MessageHistory {
    messages: Vec<Message>,
    token_budget: usize,
}

impl MessageHistory {
    pub fn new(token_budget: usize) -> Self {
        Self {
            messages: Vec::new(),
            token_budget,
        }
    }

    /// Append a message, evicting oldest entries while over budget
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.trim();
    }

    fn trim(&mut self) {
        while self.messages.len() > 1 && self.tokens() > self.token_budget {
            // keep a leading system entry as the stable anchor
            let evict_at = if self.messages[0].role == Role::System && self.messages.len() > 2 {
                1
            } else if self.messages[0].role == Role::System {
                break;
            } else {
                0
            };
            let evicted = self.messages.remove(evict_at);
            debug!(role = ?evicted.role, tokens = estimate_tokens(&evicted.content), "MessageHistory: evicted entry");
        }
    }

    /// Estimated token total across all entries
    pub fn tokens(&self) -> usize {
        self.messages.iter().map(|m| estimate_tokens(&m.content)).sum()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The entries, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Discard all entries
    pub fn clear(&mut self) {
        debug!(count = self.messages.len(), "MessageHistory::clear");
        self.messages.clear();
    }
}
