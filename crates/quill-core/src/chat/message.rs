//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation:
//! the in-memory message the UI renders, the durable record the store keeps,
//! and the parsed parts derived from streamed assistant output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parser::BlockParser;

/// Represents the role of a stored chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    /// Message written by the user.
    User,
    /// Message produced by the assistant.
    Assistant,
}

/// A segment of an assistant message, as classified by [`BlockParser`].
///
/// Prose renders inline; artifacts (fenced spans) render as structured
/// cards. `is_complete` is false only for the trailing artifact whose
/// closing fence has not yet arrived in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    /// Plain prose, trimmed at block boundaries.
    Text { content: String },
    /// A fenced span, kept byte-for-byte between its delimiters.
    Artifact { content: String, is_complete: bool },
}

impl MessagePart {
    /// The textual content of this part.
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } => content,
            Self::Artifact { content, .. } => content,
        }
    }

    /// Whether this part is fully determined (always true for prose).
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Text { .. } => true,
            Self::Artifact { is_complete, .. } => *is_complete,
        }
    }
}

/// A single message in the displayed conversation.
///
/// `content` is the source of truth; `parts` is a derived projection that
/// can always be recomputed from it. Assistant messages are mutated in place
/// (matched by `id`) while their stream is running; messages are only ever
/// appended to the conversation, never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier (UUID format)
    pub id: String,
    /// Raw accumulated text
    pub content: String,
    /// Whether the user authored this message
    pub is_user: bool,
    /// Timestamp when the message was created
    pub timestamp: DateTime<Utc>,
    /// Parsed parts, present for assistant messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

impl ChatMessage {
    /// Creates a user message with a fresh identifier.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            is_user: true,
            timestamp: Utc::now(),
            parts: None,
        }
    }

    /// Creates the assistant placeholder shown while the stream opens.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: "Generating...".to_string(),
            is_user: false,
            timestamp: Utc::now(),
            parts: None,
        }
    }

    /// The role of this message.
    pub fn role(&self) -> ChatRole {
        if self.is_user {
            ChatRole::User
        } else {
            ChatRole::Assistant
        }
    }
}

/// The durable record kept by the chat store.
///
/// The store is the source of truth across application runs; the in-memory
/// [`ChatMessage`] list is authoritative only for the conversation currently
/// displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChatMessage {
    pub id: String,
    pub group_id: String,
    pub created_at: DateTime<Utc>,
    pub role: ChatRole,
    pub content: String,
}

impl StoredChatMessage {
    /// Builds the durable record for a message, tagged with its group.
    pub fn from_message(message: &ChatMessage, group_id: impl Into<String>) -> Self {
        Self {
            id: message.id.clone(),
            group_id: group_id.into(),
            created_at: message.timestamp,
            role: message.role(),
            content: message.content.trim().to_string(),
        }
    }

    /// Rehydrates the in-memory message, re-deriving parts for assistant
    /// messages.
    pub fn into_message(self) -> ChatMessage {
        let parts = match self.role {
            ChatRole::Assistant => Some(BlockParser::parse(&self.content)),
            ChatRole::User => None,
        };
        ChatMessage {
            id: self.id,
            content: self.content,
            is_user: self.role == ChatRole::User,
            timestamp: self.created_at,
            parts,
        }
    }
}
