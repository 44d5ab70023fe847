//! Streaming response coordination.
//!
//! One coordinator owns the conversation displayed for a session: it gates
//! submissions, persists both sides of the exchange, drives the model's
//! token stream through the incremental parser, and translates failures
//! into the assistant's final text. The conversation state machine is the
//! only synchronization authority in the pipeline; the background reload is
//! a no-op in every phase but `Idle`, which closes the race between a
//! mid-stream update and a stale read of storage by construction.

use chrono::Utc;
use futures::StreamExt;
use quill_core::chat::{BlockParser, ChatMessage, ChatRole, Mention, StoredChatMessage};
use quill_core::license::{LicenseState, LICENSE_REQUIRED_TEXT};
use quill_core::store::{ChatStore, SessionStore};
use quill_core::Result;
use quill_interaction::{ChatRequest, ConnectionProvider, LanguageModel, ToolDecl};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::context::ContextAssembler;
use crate::group::GroupResolver;

/// Where a conversation currently is in its submission cycle.
///
/// `Idle → PersistingUser → Generating → PersistingAssistant → Idle`, with
/// `Errored` reachable from `Generating` before the error text is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    Idle,
    PersistingUser,
    Generating,
    PersistingAssistant,
    Errored,
}

/// What the UI renders: the message list and the current phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<ChatMessage>,
    pub phase: ConversationPhase,
}

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The round ran to completion (including the error-rendered case).
    Completed,
    /// Blank input; dropped silently with no persisted trace.
    RejectedBlank,
    /// A generation is already in flight; dropped silently.
    RejectedBusy,
    /// The free-tier message limit is reached; the caller should show this
    /// text in a blocking dialog, not in the conversation.
    LicenseRequired(&'static str),
}

struct ConversationState {
    messages: Vec<ChatMessage>,
    phase: ConversationPhase,
}

/// Coordinates one conversation's submissions end to end.
pub struct ChatCoordinator {
    session_id: String,
    user_id: String,
    chat_store: Arc<dyn ChatStore>,
    connection: Arc<dyn ConnectionProvider>,
    model: Arc<dyn LanguageModel>,
    assembler: ContextAssembler,
    resolver: GroupResolver,
    license: RwLock<LicenseState>,
    state: RwLock<ConversationState>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    cancel: RwLock<CancellationToken>,
}

impl ChatCoordinator {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        chat_store: Arc<dyn ChatStore>,
        session_store: Arc<dyn SessionStore>,
        connection: Arc<dyn ConnectionProvider>,
        model: Arc<dyn LanguageModel>,
        license: LicenseState,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(ConversationSnapshot::default());
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            chat_store: chat_store.clone(),
            connection: connection.clone(),
            model,
            assembler: ContextAssembler::new(session_store, connection),
            resolver: GroupResolver::new(chat_store),
            license: RwLock::new(license),
            state: RwLock::new(ConversationState {
                messages: Vec::new(),
                phase: ConversationPhase::Idle,
            }),
            snapshot_tx,
            cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Subscribes to conversation snapshots. The UI holds the receiving end
    /// and re-renders on every change.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Updates the license state consulted by the submission gate.
    pub async fn set_license(&self, license: LicenseState) {
        *self.license.write().await = license;
    }

    /// The current phase.
    pub async fn phase(&self) -> ConversationPhase {
        self.state.read().await.phase
    }

    /// The current in-memory message list.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    /// The resolver backing this conversation, for history listings.
    pub fn resolver(&self) -> &GroupResolver {
        &self.resolver
    }

    /// Requests cooperative cancellation of the in-flight generation, if
    /// any. The partial accumulation is kept and persisted as the
    /// assistant's message.
    pub async fn cancel_generation(&self) {
        self.cancel.read().await.cancel();
    }

    /// Runs one full submission round.
    ///
    /// Blank input and an in-flight generation are rejected silently; the
    /// free-tier gate rejects with dialog text. Otherwise the user message
    /// is appended optimistically and persisted, the context is assembled,
    /// and the model stream is folded into the assistant placeholder chunk
    /// by chunk. Any generation failure becomes the assistant's final text,
    /// persisted exactly as rendered.
    ///
    /// # Errors
    ///
    /// Returns an error only when the chat group cannot be resolved or
    /// created; everything past that point degrades to a rendered message
    /// or a log line.
    pub async fn submit(&self, text: &str, mentions: &[Mention]) -> Result<SubmitOutcome> {
        if text.trim().is_empty() {
            return Ok(SubmitOutcome::RejectedBlank);
        }

        // Gate and claim the state machine in one critical section. The
        // fresh cancellation handle is installed before the phase change is
        // observable, so a cancel issued at any later point targets this
        // round.
        let cancel = CancellationToken::new();
        let prior = {
            let mut state = self.state.write().await;
            if state.phase != ConversationPhase::Idle {
                return Ok(SubmitOutcome::RejectedBusy);
            }
            let license = *self.license.read().await;
            if !license.allows_submission(state.messages.len()) {
                return Ok(SubmitOutcome::LicenseRequired(LICENSE_REQUIRED_TEXT));
            }
            state.phase = ConversationPhase::PersistingUser;
            *self.cancel.write().await = cancel.clone();
            self.emit(&state);
            state.messages.clone()
        };

        let group_id = match self
            .resolver
            .ensure_group(&self.session_id, &self.user_id)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                let mut state = self.state.write().await;
                state.phase = ConversationPhase::Idle;
                self.emit(&state);
                return Err(err);
            }
        };

        // Optimistic append: the UI shows the message before storage
        // acknowledges it.
        let user_message = ChatMessage::user(text);
        {
            let mut state = self.state.write().await;
            state.messages.push(user_message.clone());
            self.emit(&state);
        }

        // The write is awaited so it completes logically before the
        // assistant placeholder exists, but a failure only logs: the
        // in-memory conversation stays authoritative for this session.
        if let Err(err) = self
            .chat_store
            .upsert_chat_message(StoredChatMessage::from_message(&user_message, &group_id))
            .await
        {
            tracing::warn!(error = %err, "Failed to persist user message");
        }

        let assistant = ChatMessage::assistant_placeholder();
        let assistant_id = assistant.id.clone();
        {
            let mut state = self.state.write().await;
            state.phase = ConversationPhase::Generating;
            state.messages.push(assistant);
            self.emit(&state);
        }

        let context = match self
            .assembler
            .assemble(&self.session_id, &prior, text, mentions)
            .await
        {
            Ok(context) => context,
            Err(err) => {
                self.finish_with_error(&assistant_id, &group_id, err.to_string())
                    .await;
                return Ok(SubmitOutcome::Completed);
            }
        };

        let mut request = ChatRequest::new(context);
        if let Ok(kind) = self.connection.connection_kind().await {
            if kind.supports_progress_tool() {
                request = request.with_tools(vec![ToolDecl::update_progress()]);
            }
        }

        let mut stream = match self.model.stream_chat(request).await {
            Ok(stream) => stream,
            Err(err) => {
                self.finish_with_error(&assistant_id, &group_id, err.to_string())
                    .await;
                return Ok(SubmitOutcome::Completed);
            }
        };

        let mut parser = BlockParser::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                chunk = stream.next() => match chunk {
                    Some(Ok(delta)) => {
                        parser.feed(&delta);
                        let mut state = self.state.write().await;
                        if let Some(message) =
                            state.messages.iter_mut().find(|m| m.id == assistant_id)
                        {
                            message.content = parser.text().to_string();
                            message.parts = Some(parser.parts());
                        }
                        self.emit(&state);
                    }
                    Some(Err(err)) => {
                        self.finish_with_error(&assistant_id, &group_id, err.to_string())
                            .await;
                        return Ok(SubmitOutcome::Completed);
                    }
                    None => break,
                },
            }
        }

        {
            let mut state = self.state.write().await;
            state.phase = ConversationPhase::PersistingAssistant;
            self.emit(&state);
        }

        let record = StoredChatMessage {
            id: assistant_id,
            group_id,
            created_at: Utc::now(),
            role: ChatRole::Assistant,
            content: parser.text().trim().to_string(),
        };
        if let Err(err) = self.chat_store.upsert_chat_message(record).await {
            tracing::warn!(error = %err, "Failed to persist assistant message");
        }

        {
            let mut state = self.state.write().await;
            state.phase = ConversationPhase::Idle;
            self.emit(&state);
        }

        Ok(SubmitOutcome::Completed)
    }

    /// Replaces the in-memory conversation with the persisted one for the
    /// current group.
    ///
    /// A no-op in every phase but `Idle`: while a generation (or its final
    /// write) is in flight, a reload would clobber a mid-stream update with
    /// a stale, not-yet-persisted read. Returns whether a reload happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn reload_from_store(&self) -> Result<bool> {
        if self.phase().await != ConversationPhase::Idle {
            return Ok(false);
        }

        let Some(group_id) = self.resolver.resolve(&self.session_id).await? else {
            return Ok(false);
        };
        let stored = self.chat_store.list_chat_messages(&group_id).await?;
        let messages: Vec<ChatMessage> = stored
            .into_iter()
            .map(StoredChatMessage::into_message)
            .collect();

        let mut state = self.state.write().await;
        // The phase may have left Idle while we were reading; check again
        // before touching the list.
        if state.phase != ConversationPhase::Idle {
            return Ok(false);
        }
        state.messages = messages;
        self.emit(&state);
        Ok(true)
    }

    /// Renders a generation failure as the assistant's final message and
    /// persists exactly that text, so the stored and displayed conversation
    /// never diverge.
    async fn finish_with_error(&self, assistant_id: &str, group_id: &str, raw_error: String) {
        let message = if raw_error.contains("too large") {
            format!(
                "Sorry, I encountered an error. Please try again. Your transcript or meeting \
                 notes might be too large. Please try again with a smaller transcript or \
                 meeting notes.\n\n{raw_error}"
            )
        } else {
            format!("Sorry, I encountered an error. Please try again. \n\n{raw_error}")
        };

        {
            let mut state = self.state.write().await;
            state.phase = ConversationPhase::Errored;
            if let Some(entry) = state.messages.iter_mut().find(|m| m.id == assistant_id) {
                entry.content = message.clone();
                entry.parts = None;
            }
            self.emit(&state);
        }

        let record = StoredChatMessage {
            id: assistant_id.to_string(),
            group_id: group_id.to_string(),
            created_at: Utc::now(),
            role: ChatRole::Assistant,
            content: message,
        };
        if let Err(err) = self.chat_store.upsert_chat_message(record).await {
            tracing::warn!(error = %err, "Failed to persist assistant error message");
        }

        let mut state = self.state.write().await;
        state.phase = ConversationPhase::Idle;
        self.emit(&state);
    }

    fn emit(&self, state: &ConversationState) {
        self.snapshot_tx.send_replace(ConversationSnapshot {
            messages: state.messages.clone(),
            phase: state.phase,
        });
    }
}
