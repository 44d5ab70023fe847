//! Mention references attached to a submission.

use serde::{Deserialize, Serialize};

/// What a mention points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    /// Another meeting note
    Note,
    /// A person
    Human,
}

/// A user-attached reference whose content is folded into the model's
/// context for the current turn.
///
/// Owned by the caller (the UI layer); read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub kind: MentionKind,
    /// Display label, used to head the appended context block
    pub label: String,
}
