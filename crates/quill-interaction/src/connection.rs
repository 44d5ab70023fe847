//! Model connection configuration.
//!
//! Supports reading secrets from `~/.config/quill/secret.json`, falling back
//! to environment variables.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::model::ModelError;

const DEFAULT_LOCAL_API_BASE: &str = "http://localhost:52693/v1";
const DEFAULT_MODEL: &str = "defaultModel";

/// Which kind of endpoint the active connection points at.
///
/// The kind decides downstream affordances: the local inference server
/// understands the progress-reporting tool, remote endpoints do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Hosted endpoint
    Cloud,
    /// Bundled local inference server
    Local,
    /// User-supplied OpenAI-compatible endpoint
    Custom,
}

impl ConnectionKind {
    /// Whether tool-calling affordances should be exposed on this
    /// connection.
    pub fn supports_progress_tool(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Resolved connection settings for the chat model.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub kind: ConnectionKind,
    /// Base URL of the OpenAI-compatible API, e.g. `http://host/v1`
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl ConnectionConfig {
    /// Loads connection settings.
    ///
    /// Priority:
    /// 1. `~/.config/quill/secret.json`
    /// 2. Environment variables (`QUILL_API_BASE`, `QUILL_API_KEY`,
    ///    `QUILL_MODEL_NAME`)
    /// 3. The bundled local server defaults
    pub fn try_from_env() -> Result<Self, ModelError> {
        if let Ok(config) = Self::load_secret_file() {
            return Ok(config);
        }

        if let Ok(api_base) = env::var("QUILL_API_BASE") {
            let kind = if api_base.contains("localhost") || api_base.contains("127.0.0.1") {
                ConnectionKind::Local
            } else {
                ConnectionKind::Custom
            };
            return Ok(Self {
                kind,
                api_base,
                api_key: env::var("QUILL_API_KEY").ok(),
                model: env::var("QUILL_MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            });
        }

        Ok(Self {
            kind: ConnectionKind::Local,
            api_base: DEFAULT_LOCAL_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    fn load_secret_file() -> Result<Self, ModelError> {
        let path = Self::secret_path()?;
        if !path.exists() {
            return Err(ModelError::Config(format!(
                "Configuration file not found at: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            ModelError::Config(format!(
                "Failed to read configuration file at {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ModelError::Config(format!(
                "Failed to parse configuration file at {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Returns the path to the configuration file:
    /// `~/.config/quill/secret.json`
    fn secret_path() -> Result<PathBuf, ModelError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ModelError::Config("Could not determine home directory".into()))?;
        Ok(home.join(".config").join("quill").join("secret.json"))
    }
}

/// Supplies the active connection kind to the context assembler.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// The kind of the currently active model connection.
    async fn connection_kind(&self) -> quill_core::Result<ConnectionKind>;
}

/// A fixed connection, resolved once at startup.
pub struct StaticConnection {
    kind: ConnectionKind,
}

impl StaticConnection {
    pub fn new(kind: ConnectionKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ConnectionProvider for StaticConnection {
    async fn connection_kind(&self) -> quill_core::Result<ConnectionKind> {
        Ok(self.kind)
    }
}
