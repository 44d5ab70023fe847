//! System prompt template rendering.
//!
//! The prompt is a compiled-in minijinja template rendered against a
//! [`SystemPromptContext`]; rendering is pure from the pipeline's
//! perspective.

use minijinja::Environment;
use once_cell::sync::Lazy;
use quill_core::{QuillError, Result};
use serde::Serialize;

const CHAT_SYSTEM_TEMPLATE: &str = include_str!("templates/chat_system.j2");

static TEMPLATES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.add_template("chat.system", CHAT_SYSTEM_TEMPLATE)
        .expect("bundled chat.system template must compile");
    env
});

/// Everything the system prompt template needs for one turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemPromptContext {
    pub title: String,
    pub raw_content: String,
    pub enhanced_content: Option<String>,
    pub pre_meeting_content: Option<String>,
    /// Transcript words, pre-serialized as JSON
    pub words: String,
    /// Active connection kind
    pub connection: String,
    /// Current local date and time, human readable
    pub date: String,
    /// Participant display names
    pub participants: Vec<String>,
    /// Calendar event line, or empty when the session has none
    pub event: String,
}

/// Renders the `chat.system` prompt.
pub fn render_system_prompt(context: &SystemPromptContext) -> Result<String> {
    let template = TEMPLATES
        .get_template("chat.system")
        .map_err(|e| QuillError::Template(e.to_string()))?;
    template
        .render(context)
        .map_err(|e| QuillError::Template(e.to_string()))
}
