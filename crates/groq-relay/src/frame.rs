//! Event-stream frame codec.
//!
//! Both sides of the relay speak the same line-oriented framing:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: [DONE]
//!
//! ```
//!
//! Decoding classifies one upstream line at a time; encoding produces exactly
//! one downstream frame per value.

use serde_json::{json, Value};

/// Prefix marking a data line.
pub const DATA_PREFIX: &str = "data: ";

/// Terminal sentinel carried in place of a JSON payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of a single upstream line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent<'a> {
    /// Not a data line (blank lines, comments, `event:` fields, ...).
    Ignored,
    /// The `[DONE]` sentinel.
    Done,
    /// Trimmed payload of a data line, expected to be JSON.
    Payload(&'a str),
}

pub fn parse_line(line: &str) -> LineEvent<'_> {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return LineEvent::Ignored;
    };

    let data = rest.trim();
    if data == DONE_SENTINEL {
        LineEvent::Done
    } else {
        LineEvent::Payload(data)
    }
}

/// Extract the incremental text at `choices[0].delta.content`.
///
/// Returns `Ok(None)` when the field is absent, not a string, or empty.
pub fn extract_token(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let v: Value = serde_json::from_str(payload)?;

    let token = v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    Ok(token)
}

/// A downstream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Token(String),
    Error(&'static str),
    Done,
}

impl Frame {
    pub fn encode(&self) -> String {
        match self {
            Frame::Token(token) => sse_data(&json!({ "token": token })),
            Frame::Error(message) => sse_data(&json!({ "error": message })),
            Frame::Done => format!("{}{}\n\n", DATA_PREFIX, DONE_SENTINEL),
        }
    }
}

fn sse_data(data: &Value) -> String {
    format!("{}{}\n\n", DATA_PREFIX, data)
}

/// Reassembles lines across chunk boundaries.
///
/// A trailing line without its `\n` is held until more text arrives or the
/// stream ends.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text and return every line it completes.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut lines = Vec::new();
        while let Some(idx) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=idx).collect();
            line.pop();
            strip_cr(&mut line);
            lines.push(line);
        }
        lines
    }

    /// Return the unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        strip_cr(&mut line);
        Some(line)
    }
}

fn strip_cr(line: &mut String) {
    if line.ends_with('\r') {
        line.pop();
    }
}
