use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Quill - meeting notes assistant chat engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to a session's assistant and stream the reply
    Chat {
        /// Meeting session id
        #[arg(long)]
        session: String,
        /// User id owning the conversation
        #[arg(long, default_value = "local-user")]
        user: String,
        /// The message to send
        message: String,
    },
    /// List a session's conversations, most recently active first
    History {
        /// Meeting session id
        #[arg(long)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            session,
            user,
            message,
        } => commands::chat::run(&session, &user, &message).await?,
        Commands::History { session } => commands::history::run(&session).await?,
    }

    Ok(())
}
