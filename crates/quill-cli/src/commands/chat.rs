use anyhow::{bail, Result};
use quill_application::{ChatCoordinator, ConversationPhase, SubmitOutcome};
use quill_core::license::LicenseState;
use quill_infrastructure::{TomlChatStore, TomlSessionStore};
use quill_interaction::{ConnectionConfig, OpenAiChatModel, StaticConnection};
use std::io::Write;
use std::sync::Arc;

/// Sends one message through the full pipeline and streams the reply to
/// stdout.
pub async fn run(session_id: &str, user_id: &str, message: &str) -> Result<()> {
    let chat_store = Arc::new(TomlChatStore::default_location().await?);
    let session_store = Arc::new(TomlSessionStore::default_location().await?);
    let config = ConnectionConfig::try_from_env()?;
    let model = Arc::new(OpenAiChatModel::from_config(&config));
    let connection = Arc::new(StaticConnection::new(config.kind));

    let coordinator = Arc::new(ChatCoordinator::new(
        session_id,
        user_id,
        chat_store,
        session_store,
        connection,
        model,
        LicenseState { valid: true },
    ));
    coordinator.reload_from_store().await?;

    // Print the assistant text as it grows; the accumulator only ever
    // extends during generation, so the unprinted suffix is well defined.
    let mut snapshots = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        let mut printed = 0usize;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if snapshot.phase == ConversationPhase::Generating {
                if let Some(last) = snapshot.messages.last().filter(|m| !m.is_user) {
                    let content = &last.content;
                    if content.len() > printed && content != "Generating..." {
                        print!("{}", &content[printed..]);
                        let _ = std::io::stdout().flush();
                        printed = content.len();
                    }
                }
            }
            if snapshot.phase == ConversationPhase::Idle {
                break;
            }
        }
        printed
    });

    match coordinator.submit(message, &[]).await? {
        SubmitOutcome::Completed => {}
        SubmitOutcome::RejectedBlank => bail!("Message is empty"),
        SubmitOutcome::RejectedBusy => bail!("A generation is already running"),
        SubmitOutcome::LicenseRequired(text) => bail!("{text}"),
    }

    let printed = printer.await?;
    if printed == 0 {
        // Nothing streamed: the reply was replaced wholesale (error text).
        if let Some(last) = coordinator.messages().await.last() {
            println!("{}", last.content);
        }
    } else {
        println!();
    }

    Ok(())
}
