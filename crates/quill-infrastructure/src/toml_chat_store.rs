//! TOML-based ChatStore implementation.

use async_trait::async_trait;
use quill_core::chat::{ChatGroup, StoredChatMessage};
use quill_core::store::ChatStore;
use quill_core::{QuillError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// A store implementation keeping chat groups and messages as individual
/// TOML files.
///
/// Directory structure:
/// ```text
/// base_dir/
/// ├── groups/
/// │   └── <group_id>.toml
/// └── messages/
///     └── <group_id>/
///         └── <message_id>.toml
/// ```
///
/// Writes are whole-file rewrites; `upsert_chat_message` is insert-or-replace
/// by message id. No transactionality is provided across calls.
pub struct TomlChatStore {
    base_dir: PathBuf,
}

impl TomlChatStore {
    /// Creates a new `TomlChatStore` rooted at the given base directory.
    ///
    /// The directory structure is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("groups")).await?;
        fs::create_dir_all(base_dir.join("messages")).await?;
        Ok(Self { base_dir })
    }

    /// Creates a `TomlChatStore` at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// directories cannot be created.
    pub async fn default_location() -> Result<Self> {
        Self::new(crate::paths::QuillPaths::store_dir()?).await
    }

    fn group_path(&self, group_id: &str) -> PathBuf {
        self.base_dir.join("groups").join(format!("{group_id}.toml"))
    }

    fn messages_dir(&self, group_id: &str) -> PathBuf {
        self.base_dir.join("messages").join(group_id)
    }

    fn message_path(&self, group_id: &str, message_id: &str) -> PathBuf {
        self.messages_dir(group_id)
            .join(format!("{message_id}.toml"))
    }
}

async fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).await?;
    Ok(toml::from_str(&content)?)
}

async fn write_toml<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = toml::to_string(value)?;
    fs::write(path, content).await?;
    Ok(())
}

/// Collects every `.toml` entity in a directory, returning an empty list for
/// a directory that doesn't exist yet.
async fn read_dir_toml<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut values = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            values.push(read_toml(&path).await?);
        }
    }
    Ok(values)
}

#[async_trait]
impl ChatStore for TomlChatStore {
    async fn create_chat_group(&self, group: ChatGroup) -> Result<ChatGroup> {
        write_toml(&self.group_path(&group.id), &group).await?;
        Ok(group)
    }

    async fn list_chat_groups(&self, session_id: &str) -> Result<Vec<ChatGroup>> {
        let mut groups: Vec<ChatGroup> =
            read_dir_toml(&self.base_dir.join("groups")).await?;
        groups.retain(|group: &ChatGroup| group.session_id == session_id);
        groups.sort_by_key(|group| group.created_at);
        Ok(groups)
    }

    async fn list_chat_messages(&self, group_id: &str) -> Result<Vec<StoredChatMessage>> {
        let mut messages: Vec<StoredChatMessage> =
            read_dir_toml(&self.messages_dir(group_id)).await?;
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }

    async fn upsert_chat_message(&self, message: StoredChatMessage) -> Result<StoredChatMessage> {
        if message.group_id.is_empty() {
            return Err(QuillError::data_access(
                "Cannot persist a message without a group id",
            ));
        }
        fs::create_dir_all(self.messages_dir(&message.group_id)).await?;
        write_toml(&self.message_path(&message.group_id, &message.id), &message).await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use quill_core::chat::{ChatMessage, ChatRole};
    use tempfile::TempDir;

    async fn store() -> (TempDir, TomlChatStore) {
        let dir = TempDir::new().unwrap();
        let store = TomlChatStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn groups_round_trip_and_filter_by_session() {
        let (_dir, store) = store().await;

        let mine = store
            .create_chat_group(ChatGroup::new("session-a", "user-1"))
            .await
            .unwrap();
        store
            .create_chat_group(ChatGroup::new("session-b", "user-1"))
            .await
            .unwrap();

        let listed = store.list_chat_groups("session-a").await.unwrap();
        assert_eq!(listed, vec![mine]);
    }

    #[tokio::test]
    async fn messages_are_ordered_by_timestamp() {
        let (_dir, store) = store().await;
        let group = store
            .create_chat_group(ChatGroup::new("session-a", "user-1"))
            .await
            .unwrap();

        let now = Utc::now();
        for (offset, content) in [(2, "third"), (0, "first"), (1, "second")] {
            let mut message = ChatMessage::user(content);
            message.timestamp = now + Duration::seconds(offset);
            store
                .upsert_chat_message(StoredChatMessage::from_message(&message, &group.id))
                .await
                .unwrap();
        }

        let listed = store.list_chat_messages(&group.id).await.unwrap();
        let contents: Vec<&str> = listed.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let (_dir, store) = store().await;
        let group = store
            .create_chat_group(ChatGroup::new("session-a", "user-1"))
            .await
            .unwrap();

        let message = StoredChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group.id.clone(),
            created_at: Utc::now(),
            role: ChatRole::Assistant,
            content: "streaming".to_string(),
        };
        store.upsert_chat_message(message.clone()).await.unwrap();

        let finalised = StoredChatMessage {
            content: "final text".to_string(),
            ..message
        };
        store.upsert_chat_message(finalised).await.unwrap();

        let listed = store.list_chat_messages(&group.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "final text");
    }

    #[tokio::test]
    async fn empty_group_lists_no_messages() {
        let (_dir, store) = store().await;
        assert!(store.list_chat_messages("missing").await.unwrap().is_empty());
    }
}
