//! Language model trait and request types.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a model connection or its token stream.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    /// HTTP-level failure opening the stream
    #[error("{message}")]
    Http {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
    },
    /// Failure while the stream was already flowing
    #[error("Stream error: {0}")]
    Stream(String),
    /// Missing or invalid connection configuration
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

impl From<ModelError> for quill_core::QuillError {
    fn from(err: ModelError) -> Self {
        Self::Model(err.to_string())
    }
}

/// The role of a prompt message handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One role-tagged entry of the assembled context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// A tool declaration exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the tool input
    pub parameters: serde_json::Value,
}

impl ToolDecl {
    /// The progress-reporting tool the local inference server understands.
    pub fn update_progress() -> Self {
        Self {
            name: "update_progress".to_string(),
            description: None,
            parameters: serde_json::json!({ "type": "object" }),
        }
    }
}

/// One round of context for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<PromptMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDecl>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDecl>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// An asynchronous sequence of text chunks from the model.
///
/// Finite and not restartable: to retry, issue a new `stream_chat` call.
pub type TokenStream = BoxStream<'static, Result<String, ModelError>>;

/// A streaming chat model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Opens a token stream for the given context.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be issued or is rejected
    /// before any tokens flow; errors after that point surface as stream
    /// items.
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, ModelError>;
}
