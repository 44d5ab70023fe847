//! Store traits.
//!
//! These traits define the persistence boundary of the chat engine,
//! decoupling the pipeline from the specific storage mechanism (TOML files,
//! a database, a remote API). None of the calls are assumed transactional
//! across one another.

use crate::chat::{ChatGroup, StoredChatMessage};
use crate::error::Result;
use crate::session::{CalendarEvent, Human, SessionSnapshot};
use async_trait::async_trait;

/// An abstract store for chat groups and messages.
///
/// # Implementation Notes
///
/// Implementations should return messages ordered by creation time and treat
/// `upsert_chat_message` as insert-or-replace by message id: the same id is
/// written repeatedly as a streamed message is finalised or an error text
/// replaces it.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persists a new chat group.
    async fn create_chat_group(&self, group: ChatGroup) -> Result<ChatGroup>;

    /// Lists all chat groups belonging to a session.
    async fn list_chat_groups(&self, session_id: &str) -> Result<Vec<ChatGroup>>;

    /// Lists all messages of a group, ordered by creation time.
    async fn list_chat_messages(&self, group_id: &str) -> Result<Vec<StoredChatMessage>>;

    /// Inserts or replaces a message by id.
    async fn upsert_chat_message(&self, message: StoredChatMessage) -> Result<StoredChatMessage>;
}

/// An abstract store for meeting sessions and people.
///
/// Read-only from the chat engine's perspective: note content, participants
/// and calendar data are owned elsewhere.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches the current snapshot of a session.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(snapshot))`: session found
    /// - `Ok(None)`: no such session
    /// - `Err(_)`: retrieval failed
    async fn get_session(&self, id: &str) -> Result<Option<SessionSnapshot>>;

    /// Lists the people participating in a session.
    async fn list_participants(&self, session_id: &str) -> Result<Vec<Human>>;

    /// Fetches the calendar event a session is linked to, if any.
    async fn get_event(&self, session_id: &str) -> Result<Option<CalendarEvent>>;

    /// Fetches a person's profile.
    async fn get_human(&self, id: &str) -> Result<Option<Human>>;

    /// Searches sessions by text, returning at most `limit` candidates.
    async fn search_sessions(&self, query: &str, limit: usize) -> Result<Vec<SessionSnapshot>>;
}
