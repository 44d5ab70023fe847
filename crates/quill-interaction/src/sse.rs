//! Line-buffering parser for Server-Sent Events.
//!
//! SSE streams are newline-delimited, but TCP does not align network chunks
//! with event boundaries: one chunk can carry several events, and a JSON
//! payload can be split across two chunks. This parser buffers incomplete
//! lines and only emits events once a full line has arrived.

use std::mem;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Accumulates raw bytes and yields complete SSE events.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes from a network chunk, returning any complete events.
    ///
    /// A trailing partial line stays buffered for the next `feed` call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline);
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing line without a terminating newline, once the byte
    /// stream has ended.
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&remaining)
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed == "data: [DONE]" {
        return Some(SseEvent::Done);
    }
    // Non-data fields (event:, id:, retry:, comments) are ignored.
    let data = trimmed.strip_prefix("data: ")?;
    if data.trim().is_empty() {
        return None;
    }
    Some(SseEvent::Data(data.to_string()))
}
