//! Meeting session read models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time view of a meeting session.
///
/// Refetched from the store at the start of every assembly so the model
/// always sees the freshest note content, never a cached copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub title: String,
    /// The note as the user typed it
    pub raw_memo_html: String,
    /// The AI-enhanced rendition, when one exists
    pub enhanced_memo_html: Option<String>,
    /// Notes written before the meeting started
    pub pre_meeting_memo_html: Option<String>,
    /// Transcript words captured during the meeting
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

/// One recognised word of the meeting transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Offset from the start of the recording, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<u64>,
}

/// A person: a session participant or a profile referenced by a mention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Human {
    pub id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub job_title: Option<String>,
    pub linkedin_username: Option<String>,
}

/// The calendar event a session is linked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub note: Option<String>,
}
