//! Context assembly for one chat turn.
//!
//! Builds the ordered, role-tagged message list handed to the model: a
//! rendered system prompt over the freshest session snapshot, the flattened
//! prior conversation, and the new user text augmented with any mentioned
//! notes and people.

use chrono::Local;
use once_cell::sync::Lazy;
use quill_core::chat::{ChatMessage, Mention, MentionKind};
use quill_core::session::{CalendarEvent, Human, SessionSnapshot};
use quill_core::store::SessionStore;
use quill_core::{QuillError, Result};
use quill_interaction::{
    render_system_prompt, ConnectionProvider, PromptMessage, SystemPromptContext,
};
use regex::Regex;
use std::sync::Arc;

/// Marker separating what the user wrote from mention-derived context.
const MENTION_DISCLAIMER: &str = "[[From here is an automatically appended content from the \
mentioned notes & people, not what the user wrote. Use this only as a reference for more \
context. Your focus should always be the current meeting user is viewing]]";

/// How many search candidates to consider when looking up a mentioned
/// person's other sessions, and how many of them may be included.
const MENTION_SESSION_CANDIDATES: usize = 5;
const MENTION_SESSIONS_INCLUDED: usize = 2;

/// Mentioned-session text is cut at this many characters.
const MENTION_PREVIEW_CHARS: usize = 200;

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("html tag pattern must compile"));

/// Builds the prompt for one submission.
pub struct ContextAssembler {
    session_store: Arc<dyn SessionStore>,
    connection: Arc<dyn ConnectionProvider>,
}

impl ContextAssembler {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        connection: Arc<dyn ConnectionProvider>,
    ) -> Self {
        Self {
            session_store,
            connection,
        }
    }

    /// Assembles the full ordered message list for a turn.
    ///
    /// The session snapshot is refetched here rather than trusted from a
    /// cache: the model must see the freshest note content. A failing
    /// mention lookup is logged and dropped without aborting the assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if the session itself cannot be loaded or the
    /// system prompt cannot be rendered.
    pub async fn assemble(
        &self,
        session_id: &str,
        prior_messages: &[ChatMessage],
        new_user_text: &str,
        mentions: &[Mention],
    ) -> Result<Vec<PromptMessage>> {
        let snapshot = self
            .session_store
            .get_session(session_id)
            .await?
            .ok_or_else(|| QuillError::not_found("session", session_id))?;

        let connection = self.connection.connection_kind().await?;
        let participants = self.session_store.list_participants(session_id).await?;
        let event = self.session_store.get_event(session_id).await?;

        let system = render_system_prompt(&SystemPromptContext {
            title: snapshot.title.clone(),
            raw_content: snapshot.raw_memo_html.clone(),
            enhanced_content: snapshot.enhanced_memo_html.clone(),
            pre_meeting_content: snapshot.pre_meeting_memo_html.clone(),
            words: if snapshot.words.is_empty() {
                String::new()
            } else {
                serde_json::to_string(&snapshot.words)?
            },
            connection: format!("{connection:?}").to_lowercase(),
            date: Local::now().format("%B %-d, %Y at %-I:%M %p").to_string(),
            participants: participants
                .iter()
                .filter_map(|p| p.full_name.clone())
                .collect(),
            event: event.as_ref().map(format_event_line).unwrap_or_default(),
        })?;

        let mut history = Vec::with_capacity(prior_messages.len() + 2);
        history.push(PromptMessage::system(system));
        for message in prior_messages {
            history.push(if message.is_user {
                PromptMessage::user(message.content.clone())
            } else {
                PromptMessage::assistant(message.content.clone())
            });
        }

        let mut user_text = new_user_text.to_string();
        if !mentions.is_empty() {
            user_text.push_str(MENTION_DISCLAIMER);
            user_text.push_str("\n\n");
            for mention in mentions {
                match self.mention_block(mention).await {
                    Ok(Some(block)) => user_text.push_str(&block),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(
                            label = %mention.label,
                            error = %err,
                            "Skipping mention that failed to load"
                        );
                    }
                }
            }
        }

        if !user_text.is_empty() {
            history.push(PromptMessage::user(user_text));
        }

        Ok(history)
    }

    /// Renders one mention as a labelled context block, or `None` when the
    /// mention has nothing usable to contribute.
    async fn mention_block(&self, mention: &Mention) -> Result<Option<String>> {
        match mention.kind {
            MentionKind::Note => self.note_block(mention).await,
            MentionKind::Human => self.human_block(mention).await,
        }
    }

    async fn note_block(&self, mention: &Mention) -> Result<Option<String>> {
        let Some(session) = self.session_store.get_session(&mention.id).await? else {
            return Ok(None);
        };
        let Some(content) = note_content(&session) else {
            return Ok(None);
        };
        Ok(Some(format!(
            "\n\n--- Content from the note \"{}\" ---\n{}",
            mention.label, content
        )))
    }

    async fn human_block(&self, mention: &Mention) -> Result<Option<String>> {
        let Some(human) = self.session_store.get_human(&mention.id).await? else {
            return Ok(None);
        };

        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        let mut profile = String::new();
        profile.push_str(&format!("Name: {}\n", field(&human.full_name)));
        profile.push_str(&format!("Email: {}\n", field(&human.email)));
        profile.push_str(&format!("Job Title: {}\n", field(&human.job_title)));
        profile.push_str(&format!("LinkedIn: {}\n", field(&human.linkedin_username)));

        if let Some(full_name) = &human.full_name {
            match self
                .session_store
                .search_sessions(full_name, MENTION_SESSION_CANDIDATES)
                .await
            {
                Ok(candidates) if !candidates.is_empty() => {
                    profile.push_str("\nNotes this person participated in:\n");
                    for session in candidates.iter().take(MENTION_SESSIONS_INCLUDED) {
                        if !self.is_confirmed_participant(&session.id, &human).await {
                            continue;
                        }
                        let Some(content) = note_content(session) else {
                            continue;
                        };
                        let title = if session.title.is_empty() {
                            "Untitled"
                        } else {
                            &session.title
                        };
                        profile.push_str(&format!(
                            "- \"{}\": {}\n",
                            title,
                            preview(&content, MENTION_PREVIEW_CHARS)
                        ));
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        person = %full_name,
                        error = %err,
                        "Failed to search a mentioned person's sessions"
                    );
                }
            }
        }

        Ok(Some(format!(
            "\n\n--- Content about the person \"{}\" ---\n{}",
            mention.label, profile
        )))
    }

    /// A name match from search is not enough: the person must actually be
    /// listed as a participant of the candidate session.
    async fn is_confirmed_participant(&self, session_id: &str, human: &Human) -> bool {
        let participants = match self.session_store.list_participants(session_id).await {
            Ok(participants) => participants,
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "Participant lookup failed");
                return false;
            }
        };
        participants.iter().any(|p| {
            (p.full_name.is_some() && p.full_name == human.full_name)
                || (p.email.is_some() && p.email == human.email)
        })
    }
}

/// The note text of a session: enhanced HTML when present, raw otherwise,
/// `None` when both are blank.
fn note_content(session: &SessionSnapshot) -> Option<String> {
    if let Some(enhanced) = &session.enhanced_memo_html {
        if !enhanced.trim().is_empty() {
            return Some(enhanced.clone());
        }
    }
    if !session.raw_memo_html.trim().is_empty() {
        return Some(session.raw_memo_html.clone());
    }
    None
}

/// Formats the calendar event as a single human-readable line.
fn format_event_line(event: &CalendarEvent) -> String {
    let mut line = format!(
        "{} ({} - {})",
        event.name,
        event.start_date.format("%Y-%m-%d %H:%M"),
        event.end_date.format("%Y-%m-%d %H:%M"),
    );
    if let Some(note) = &event.note {
        line.push_str(&format!(" - {note}"));
    }
    line
}

/// Strips HTML tags and truncates to a fixed character budget, with a
/// trailing ellipsis.
fn preview(html: &str, max_chars: usize) -> String {
    let text = HTML_TAG.replace_all(html, "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use quill_core::session::TranscriptWord;
    use quill_interaction::{ConnectionKind, PromptRole, StaticConnection};
    use std::collections::HashMap;

    /// SessionStore stub with scriptable content and failure injection.
    #[derive(Default)]
    struct MockSessionStore {
        sessions: HashMap<String, SessionSnapshot>,
        participants: HashMap<String, Vec<Human>>,
        events: HashMap<String, CalendarEvent>,
        humans: HashMap<String, Human>,
        failing_ids: Vec<String>,
    }

    #[async_trait]
    impl SessionStore for MockSessionStore {
        async fn get_session(&self, id: &str) -> Result<Option<SessionSnapshot>> {
            if self.failing_ids.iter().any(|f| f == id) {
                return Err(QuillError::data_access("injected failure"));
            }
            Ok(self.sessions.get(id).cloned())
        }

        async fn list_participants(&self, session_id: &str) -> Result<Vec<Human>> {
            Ok(self.participants.get(session_id).cloned().unwrap_or_default())
        }

        async fn get_event(&self, session_id: &str) -> Result<Option<CalendarEvent>> {
            Ok(self.events.get(session_id).cloned())
        }

        async fn get_human(&self, id: &str) -> Result<Option<Human>> {
            if self.failing_ids.iter().any(|f| f == id) {
                return Err(QuillError::data_access("injected failure"));
            }
            Ok(self.humans.get(id).cloned())
        }

        async fn search_sessions(
            &self,
            query: &str,
            limit: usize,
        ) -> Result<Vec<SessionSnapshot>> {
            let needle = query.to_lowercase();
            let mut found: Vec<SessionSnapshot> = self
                .sessions
                .values()
                .filter(|s| {
                    s.title.to_lowercase().contains(&needle)
                        || s.raw_memo_html.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect();
            found.sort_by(|a, b| a.id.cmp(&b.id));
            found.truncate(limit);
            Ok(found)
        }
    }

    fn base_store() -> MockSessionStore {
        let mut store = MockSessionStore::default();
        store.sessions.insert(
            "s-current".to_string(),
            SessionSnapshot {
                id: "s-current".to_string(),
                title: "Weekly sync".to_string(),
                raw_memo_html: "<p>agenda</p>".to_string(),
                enhanced_memo_html: None,
                pre_meeting_memo_html: None,
                words: vec![TranscriptWord {
                    text: "hello".to_string(),
                    speaker: None,
                    start_ms: None,
                    end_ms: None,
                }],
            },
        );
        store
    }

    fn assembler(store: MockSessionStore) -> ContextAssembler {
        ContextAssembler::new(
            Arc::new(store),
            Arc::new(StaticConnection::new(ConnectionKind::Local)),
        )
    }

    fn ada() -> Human {
        Human {
            id: "h-ada".to_string(),
            full_name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            job_title: Some("Engineer".to_string()),
            linkedin_username: None,
        }
    }

    #[tokio::test]
    async fn orders_system_then_history_then_user() {
        let assembler = assembler(base_store());
        let prior = vec![
            ChatMessage::user("first question"),
            ChatMessage {
                id: "a-1".to_string(),
                content: "first answer".to_string(),
                is_user: false,
                timestamp: Utc::now(),
                parts: None,
            },
        ];

        let messages = assembler
            .assemble("s-current", &prior, "next question", &[])
            .await
            .unwrap();

        let roles: Vec<PromptRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                PromptRole::System,
                PromptRole::User,
                PromptRole::Assistant,
                PromptRole::User,
            ]
        );
        assert!(messages[0].content.contains("Weekly sync"));
        assert_eq!(messages[3].content, "next question");
    }

    #[tokio::test]
    async fn blank_user_text_without_mentions_appends_nothing() {
        let assembler = assembler(base_store());
        let messages = assembler.assemble("s-current", &[], "", &[]).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, PromptRole::System);
    }

    #[tokio::test]
    async fn missing_session_fails_assembly() {
        let assembler = assembler(MockSessionStore::default());
        let result = assembler.assemble("absent", &[], "hi", &[]).await;
        assert!(matches!(result, Err(QuillError::NotFound { .. })));
    }

    #[tokio::test]
    async fn note_mention_prefers_enhanced_content() {
        let mut store = base_store();
        store.sessions.insert(
            "s-note".to_string(),
            SessionSnapshot {
                id: "s-note".to_string(),
                title: "Design review".to_string(),
                raw_memo_html: "<p>raw</p>".to_string(),
                enhanced_memo_html: Some("<p>polished</p>".to_string()),
                pre_meeting_memo_html: None,
                words: vec![],
            },
        );

        let assembler = assembler(store);
        let mention = Mention {
            id: "s-note".to_string(),
            kind: MentionKind::Note,
            label: "Design review".to_string(),
        };
        let messages = assembler
            .assemble("s-current", &[], "compare with this", &[mention])
            .await
            .unwrap();

        let user = &messages.last().unwrap().content;
        assert!(user.starts_with("compare with this"));
        assert!(user.contains("automatically appended content"));
        assert!(user.contains("--- Content from the note \"Design review\" ---"));
        assert!(user.contains("<p>polished</p>"));
        assert!(!user.contains("<p>raw</p>"));
    }

    #[tokio::test]
    async fn human_mention_truncates_and_requires_confirmed_participation() {
        let mut store = base_store();
        let long_text = format!("<p>{}</p>", "word ".repeat(100));
        // Confirmed: Ada appears in this session's participant list.
        store.sessions.insert(
            "s-a-confirmed".to_string(),
            SessionSnapshot {
                id: "s-a-confirmed".to_string(),
                title: "Ada Lovelace planning".to_string(),
                raw_memo_html: long_text.clone(),
                enhanced_memo_html: None,
                pre_meeting_memo_html: None,
                words: vec![],
            },
        );
        store
            .participants
            .insert("s-a-confirmed".to_string(), vec![ada()]);
        // Name-matched but Ada is not actually a participant.
        store.sessions.insert(
            "s-b-unconfirmed".to_string(),
            SessionSnapshot {
                id: "s-b-unconfirmed".to_string(),
                title: "Ada Lovelace retro".to_string(),
                raw_memo_html: "<p>secret</p>".to_string(),
                enhanced_memo_html: None,
                pre_meeting_memo_html: None,
                words: vec![],
            },
        );
        store.humans.insert("h-ada".to_string(), ada());

        let assembler = assembler(store);
        let mention = Mention {
            id: "h-ada".to_string(),
            kind: MentionKind::Human,
            label: "Ada".to_string(),
        };
        let messages = assembler
            .assemble("s-current", &[], "who is ada?", &[mention])
            .await
            .unwrap();

        let user = &messages.last().unwrap().content;
        assert!(user.contains("--- Content about the person \"Ada\" ---"));
        assert!(user.contains("Name: Ada Lovelace"));
        assert!(user.contains("Ada Lovelace planning"));
        assert!(!user.contains("secret"));

        // The preview is capped at 200 characters plus the ellipsis.
        let preview_line = user
            .lines()
            .find(|line| line.starts_with("- \"Ada Lovelace planning\""))
            .unwrap();
        let preview_text = preview_line
            .split_once(": ")
            .unwrap()
            .1
            .trim_end_matches("...");
        assert_eq!(preview_text.chars().count(), 200);
        assert!(preview_line.ends_with("..."));
    }

    #[tokio::test]
    async fn failing_mention_is_dropped_without_aborting() {
        let mut store = base_store();
        store.failing_ids.push("h-broken".to_string());
        store.sessions.insert(
            "s-note".to_string(),
            SessionSnapshot {
                id: "s-note".to_string(),
                title: "Good note".to_string(),
                raw_memo_html: "<p>content</p>".to_string(),
                enhanced_memo_html: None,
                pre_meeting_memo_html: None,
                words: vec![],
            },
        );

        let assembler = assembler(store);
        let mentions = vec![
            Mention {
                id: "h-broken".to_string(),
                kind: MentionKind::Human,
                label: "Broken".to_string(),
            },
            Mention {
                id: "s-note".to_string(),
                kind: MentionKind::Note,
                label: "Good note".to_string(),
            },
        ];
        let messages = assembler
            .assemble("s-current", &[], "context please", &mentions)
            .await
            .unwrap();

        let user = &messages.last().unwrap().content;
        assert!(!user.contains("Broken"));
        assert!(user.contains("--- Content from the note \"Good note\" ---"));
    }

    #[tokio::test]
    async fn event_line_includes_note_only_when_present() {
        let event = CalendarEvent {
            name: "Weekly sync".to_string(),
            start_date: Utc::now(),
            end_date: Utc::now(),
            note: None,
        };
        let line = format_event_line(&event);
        assert!(line.starts_with("Weekly sync ("));
        assert!(line.ends_with(')'));

        let with_note = CalendarEvent {
            note: Some("room 4".to_string()),
            ..event
        };
        assert!(format_event_line(&with_note).ends_with(") - room 4"));
    }
}
