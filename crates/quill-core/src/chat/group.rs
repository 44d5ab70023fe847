//! Chat group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation thread scoping a sequence of messages to one meeting
/// session.
///
/// A session may own any number of groups; the "current" one is computed
/// from message activity, never stored (see the group resolver). Groups are
/// never deleted by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGroup {
    /// Unique group identifier (UUID format)
    pub id: String,
    /// The meeting session this thread belongs to
    pub session_id: String,
    /// Owner of the thread
    pub user_id: String,
    /// Optional user-visible name
    pub name: Option<String>,
    /// Timestamp when the group was created
    pub created_at: DateTime<Utc>,
}

impl ChatGroup {
    /// Creates a group with a fresh random identifier.
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            name: None,
            created_at: Utc::now(),
        }
    }
}

/// A group plus the preview data the conversation history list shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub group: ChatGroup,
    /// Content of the first user message, if any
    pub first_user_message: Option<String>,
    /// Most recent message timestamp, or the group's creation time when the
    /// group has no messages yet
    pub last_activity: DateTime<Utc>,
}
