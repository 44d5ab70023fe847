use anyhow::Result;
use quill_application::GroupResolver;
use quill_infrastructure::TomlChatStore;
use std::sync::Arc;

/// Prints a session's conversations, most recently active first.
pub async fn run(session_id: &str) -> Result<()> {
    let chat_store = Arc::new(TomlChatStore::default_location().await?);
    let resolver = GroupResolver::new(chat_store);

    let summaries = resolver.conversation_summaries(session_id).await?;
    if summaries.is_empty() {
        println!("No conversations for session {session_id}");
        return Ok(());
    }

    for summary in summaries {
        println!(
            "{}  {}  {}",
            summary.group.id,
            summary.last_activity.format("%Y-%m-%d %H:%M"),
            summary
                .first_user_message
                .as_deref()
                .unwrap_or("(no messages)"),
        );
    }

    Ok(())
}
