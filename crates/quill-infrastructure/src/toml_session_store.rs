//! TOML-based SessionStore implementation.

use async_trait::async_trait;
use quill_core::session::{CalendarEvent, Human, SessionSnapshot};
use quill_core::store::SessionStore;
use quill_core::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// A read store for meeting sessions and people backed by TOML files.
///
/// Directory structure:
/// ```text
/// base_dir/
/// ├── sessions/
/// │   └── <session_id>.toml
/// └── humans/
///     └── <human_id>.toml
/// ```
///
/// The chat engine only reads through the [`SessionStore`] trait; the
/// inherent `save_*` methods exist for the application that owns this data
/// (and for tests).
pub struct TomlSessionStore {
    base_dir: PathBuf,
}

/// On-disk record joining a session snapshot with its participant links and
/// calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub participant_ids: Vec<String>,
    pub session: SessionSnapshot,
    #[serde(default)]
    pub event: Option<CalendarEvent>,
}

impl TomlSessionStore {
    /// Creates a new `TomlSessionStore` rooted at the given base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("sessions")).await?;
        fs::create_dir_all(base_dir.join("humans")).await?;
        Ok(Self { base_dir })
    }

    /// Creates a `TomlSessionStore` at the default location.
    pub async fn default_location() -> Result<Self> {
        Self::new(crate::paths::QuillPaths::store_dir()?).await
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_dir.join("sessions").join(format!("{id}.toml"))
    }

    fn human_path(&self, id: &str) -> PathBuf {
        self.base_dir.join("humans").join(format!("{id}.toml"))
    }

    /// Writes a session record.
    pub async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        let content = toml::to_string(record)?;
        fs::write(self.session_path(&record.session.id), content).await?;
        Ok(())
    }

    /// Writes a person's profile.
    pub async fn save_human(&self, human: &Human) -> Result<()> {
        let content = toml::to_string(human)?;
        fs::write(self.human_path(&human.id), content).await?;
        Ok(())
    }

    async fn read_record(&self, id: &str) -> Result<Option<SessionRecord>> {
        match fs::read_to_string(self.session_path(id)).await {
            Ok(content) => Ok(Some(toml::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl SessionStore for TomlSessionStore {
    async fn get_session(&self, id: &str) -> Result<Option<SessionSnapshot>> {
        Ok(self.read_record(id).await?.map(|record| record.session))
    }

    async fn list_participants(&self, session_id: &str) -> Result<Vec<Human>> {
        let Some(record) = self.read_record(session_id).await? else {
            return Ok(Vec::new());
        };

        let mut participants = Vec::new();
        for id in &record.participant_ids {
            if let Some(human) = self.get_human(id).await? {
                participants.push(human);
            }
        }
        Ok(participants)
    }

    async fn get_event(&self, session_id: &str) -> Result<Option<CalendarEvent>> {
        Ok(self.read_record(session_id).await?.and_then(|r| r.event))
    }

    async fn get_human(&self, id: &str) -> Result<Option<Human>> {
        match fs::read_to_string(self.human_path(id)).await {
            Ok(content) => Ok(Some(toml::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn search_sessions(&self, query: &str, limit: usize) -> Result<Vec<SessionSnapshot>> {
        let needle = query.to_lowercase();
        let mut entries = fs::read_dir(self.base_dir.join("sessions")).await?;
        let mut matches = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if matches.len() >= limit {
                break;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            let record: SessionRecord = toml::from_str(&content)?;
            let session = record.session;
            let haystacks = [
                Some(&session.title),
                Some(&session.raw_memo_html),
                session.enhanced_memo_html.as_ref(),
            ];
            if haystacks
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(&needle))
            {
                matches.push(session);
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn snapshot(id: &str, title: &str) -> SessionSnapshot {
        SessionSnapshot {
            id: id.to_string(),
            title: title.to_string(),
            raw_memo_html: "<p>notes</p>".to_string(),
            ..Default::default()
        }
    }

    async fn store() -> (TempDir, TomlSessionStore) {
        let dir = TempDir::new().unwrap();
        let store = TomlSessionStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn session_round_trips_with_event_and_participants() {
        let (_dir, store) = store().await;

        let ada = Human {
            id: "h-ada".to_string(),
            full_name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        };
        store.save_human(&ada).await.unwrap();

        let record = SessionRecord {
            participant_ids: vec!["h-ada".to_string(), "h-missing".to_string()],
            session: snapshot("s-1", "Weekly sync"),
            event: Some(CalendarEvent {
                name: "Weekly sync".to_string(),
                start_date: Utc::now(),
                end_date: Utc::now(),
                note: Some("bring the numbers".to_string()),
            }),
        };
        store.save_session(&record).await.unwrap();

        let loaded = store.get_session("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Weekly sync");

        let participants = store.list_participants("s-1").await.unwrap();
        assert_eq!(participants, vec![ada]);

        let event = store.get_event("s-1").await.unwrap().unwrap();
        assert_eq!(event.note.as_deref(), Some("bring the numbers"));
    }

    #[tokio::test]
    async fn missing_session_reads_as_none() {
        let (_dir, store) = store().await;
        assert!(store.get_session("nope").await.unwrap().is_none());
        assert!(store.list_participants("nope").await.unwrap().is_empty());
        assert!(store.get_event("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_matches_title_and_content_up_to_limit() {
        let (_dir, store) = store().await;
        for i in 0..4 {
            let record = SessionRecord {
                participant_ids: vec![],
                session: snapshot(&format!("s-{i}"), &format!("Planning {i}")),
                event: None,
            };
            store.save_session(&record).await.unwrap();
        }

        let found = store.search_sessions("planning", 2).await.unwrap();
        assert_eq!(found.len(), 2);

        let by_content = store.search_sessions("notes", 10).await.unwrap();
        assert_eq!(by_content.len(), 4);

        assert!(store.search_sessions("absent", 10).await.unwrap().is_empty());
    }
}
