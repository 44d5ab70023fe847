//! Chat group resolution.
//!
//! Picks the conversation thread that should receive new messages for a
//! session. Selection is by most recent activity, not creation order: a
//! group the user wrote into five minutes ago wins over one created later
//! but left untouched.

use chrono::{DateTime, Utc};
use quill_core::chat::{ChatGroup, ChatRole, ConversationSummary};
use quill_core::store::ChatStore;
use quill_core::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolves and lazily creates the current chat group of a session.
pub struct GroupResolver {
    chat_store: Arc<dyn ChatStore>,
    /// Group id cached once resolved or created
    current: RwLock<Option<String>>,
}

impl GroupResolver {
    pub fn new(chat_store: Arc<dyn ChatStore>) -> Self {
        Self {
            chat_store,
            current: RwLock::new(None),
        }
    }

    /// The cached current group id, if one has been resolved.
    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Finds the group that should be considered current for a session.
    ///
    /// For every group the most recent message timestamp is computed,
    /// falling back to the group's own creation time when it has no messages
    /// yet; the group with the maximum wins. Returns `None` when the session
    /// has no groups at all; creation is deferred until a message is
    /// actually submitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn resolve(&self, session_id: &str) -> Result<Option<String>> {
        let groups = self.chat_store.list_chat_groups(session_id).await?;

        let mut latest: Option<(DateTime<Utc>, String)> = None;
        for group in groups {
            let activity = self.last_activity(&group).await?;
            if latest.as_ref().is_none_or(|(best, _)| activity > *best) {
                latest = Some((activity, group.id));
            }
        }

        let resolved = latest.map(|(_, id)| id);
        *self.current.write().await = resolved.clone();
        Ok(resolved)
    }

    /// Returns the current group id, creating a group with a fresh random
    /// identifier when the session has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the group cannot be
    /// created.
    pub async fn ensure_group(&self, session_id: &str, user_id: &str) -> Result<String> {
        if let Some(id) = self.current().await {
            return Ok(id);
        }

        if let Some(id) = self.resolve(session_id).await? {
            return Ok(id);
        }

        let group = self
            .chat_store
            .create_chat_group(ChatGroup::new(session_id, user_id))
            .await?;
        *self.current.write().await = Some(group.id.clone());
        Ok(group.id)
    }

    /// All conversations of a session with their history previews, most
    /// recently active first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn conversation_summaries(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationSummary>> {
        let groups = self.chat_store.list_chat_groups(session_id).await?;

        let mut summaries = Vec::with_capacity(groups.len());
        for group in groups {
            let messages = self.chat_store.list_chat_messages(&group.id).await?;
            let first_user_message = messages
                .iter()
                .find(|m| m.role == ChatRole::User)
                .map(|m| m.content.clone());
            let last_activity = messages
                .iter()
                .map(|m| m.created_at)
                .max()
                .unwrap_or(group.created_at);
            summaries.push(ConversationSummary {
                group,
                first_user_message,
                last_activity,
            });
        }

        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(summaries)
    }

    async fn last_activity(&self, group: &ChatGroup) -> Result<DateTime<Utc>> {
        let messages = self.chat_store.list_chat_messages(&group.id).await?;
        Ok(messages
            .iter()
            .map(|m| m.created_at)
            .max()
            .unwrap_or(group.created_at))
    }
}
