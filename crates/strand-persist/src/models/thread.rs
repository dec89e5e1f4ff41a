use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{Message, MessageRole};

pub const DEFAULT_TITLE: &str = "New Chat";

/// Full durable state of one conversation thread: the ordered message
/// history plus its metadata. Persisted as a single document so a save is
/// all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub messages: Vec<Message>,
    pub metadata: ThreadMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadState {
    /// Fresh thread: exactly one system message and default metadata.
    pub fn initial(system_prompt: &str, now: DateTime<Utc>) -> Self {
        Self {
            messages: vec![Message {
                role: MessageRole::System,
                content: system_prompt.to_string(),
                created_at: now,
            }],
            metadata: ThreadMetadata {
                title: DEFAULT_TITLE.to_string(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn has_user_message(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == MessageRole::User)
    }

    /// Messages a client sees: everything except system entries.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_messages().count()
    }
}

/// Listing projection of one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub message_count: usize,
    pub preview_messages: Vec<String>,
}
