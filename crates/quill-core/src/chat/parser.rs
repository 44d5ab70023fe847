//! Incremental block parser for streamed assistant output.
//!
//! Classifies a growing stream of text into prose and fenced "artifact"
//! spans. The parser keeps its cursor and fence state across [`feed`] calls
//! and only scans newly-arrived text, so processing a stream is amortized
//! linear in its total length. A fence delimiter split across two chunks is
//! still recognised: the scan resumes up to two bytes before the previous
//! buffer end.
//!
//! [`feed`]: BlockParser::feed

use super::message::MessagePart;

/// The fence delimiter. Fences do not nest; a delimiter always toggles the
/// parser between prose and artifact state regardless of surrounding content.
const FENCE: &str = "```";

/// Incremental classifier for streamed assistant output.
///
/// Parts before the last observed delimiter are frozen once emitted; the
/// pending tail is reported as an incomplete artifact while inside an
/// unclosed fence, or as trailing prose otherwise. Whitespace-only spans are
/// dropped and never become parts.
#[derive(Debug, Default)]
pub struct BlockParser {
    /// Full accumulated text
    buffer: String,
    /// Parts whose closing boundary has been observed
    completed: Vec<MessagePart>,
    /// Byte offset where the current un-flushed span starts
    span_start: usize,
    /// Byte offset up to which delimiter starts have been ruled out
    scanned: usize,
    /// Whether the cursor is inside an unclosed fence
    in_fence: bool,
}

impl BlockParser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot parse of a complete string.
    ///
    /// Used to re-derive parts for messages loaded from storage. Total and
    /// deterministic: any input yields a well-formed part list.
    pub fn parse(text: &str) -> Vec<MessagePart> {
        let mut parser = Self::new();
        parser.feed(text);
        parser.parts()
    }

    /// Appends newly-arrived text and advances the scan.
    ///
    /// The model only ever appends to its output, so previously completed
    /// parts are never invalidated by a later feed.
    pub fn feed(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.push_str(chunk);
        self.scan();
    }

    /// Snapshot of the current part list: completed parts plus the pending
    /// tail (an incomplete artifact while inside a fence, trailing prose
    /// otherwise).
    pub fn parts(&self) -> Vec<MessagePart> {
        let mut parts = self.completed.clone();
        let tail = &self.buffer[self.span_start..];
        if self.in_fence {
            if !tail.trim().is_empty() {
                parts.push(MessagePart::Artifact {
                    content: tail.to_string(),
                    is_complete: false,
                });
            }
        } else {
            let trimmed = tail.trim();
            if !trimmed.is_empty() {
                parts.push(MessagePart::Text {
                    content: trimmed.to_string(),
                });
            }
        }
        parts
    }

    /// The full text fed so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    fn scan(&mut self) {
        while let Some(offset) = self.buffer[self.scanned..].find(FENCE) {
            let at = self.scanned + offset;
            let span = &self.buffer[self.span_start..at];
            if self.in_fence {
                // Closing delimiter: the artifact keeps interior whitespace
                // exactly so fenced content round-trips.
                if !span.trim().is_empty() {
                    self.completed.push(MessagePart::Artifact {
                        content: span.to_string(),
                        is_complete: true,
                    });
                }
            } else {
                let trimmed = span.trim();
                if !trimmed.is_empty() {
                    self.completed.push(MessagePart::Text {
                        content: trimmed.to_string(),
                    });
                }
            }
            self.in_fence = !self.in_fence;
            self.span_start = at + FENCE.len();
            self.scanned = self.span_start;
        }

        // No complete delimiter beyond `scanned`. A partial one may end the
        // buffer, so the next scan must resume FENCE.len() - 1 bytes early,
        // floored to a char boundary.
        let mut resume = self
            .buffer
            .len()
            .saturating_sub(FENCE.len() - 1)
            .max(self.span_start);
        while !self.buffer.is_char_boundary(resume) {
            resume -= 1;
        }
        self.scanned = resume;
    }
}
