//! Model interaction layer.
//!
//! Connection configuration, the [`LanguageModel`] streaming trait, the
//! OpenAI-compatible chat client used by both the local inference server and
//! the cloud endpoint, and the system prompt template.

mod connection;
mod model;
mod openai_model;
mod sse;
mod template;

pub use connection::{ConnectionConfig, ConnectionKind, ConnectionProvider, StaticConnection};
pub use model::{
    ChatRequest, LanguageModel, ModelError, PromptMessage, PromptRole, TokenStream, ToolDecl,
};
pub use openai_model::OpenAiChatModel;
pub use sse::{SseEvent, SseLineBuffer};
pub use template::{render_system_prompt, SystemPromptContext};
