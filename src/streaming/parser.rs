//! SSE payload extraction
//!
//! Turns the raw `data` text of one SSE event into a [`Payload`]. Format
//! problems are never fatal: anything that cannot be understood is logged and
//! skipped so the stream keeps flowing.

use super::wrapper::{WorkflowEventMessage, WrapperRecord, looks_like_record};
use serde_json::Value;

/// Literal end-of-stream marker
pub const DONE_SENTINEL: &str = "[DONE]";

/// Result of parsing one event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Non-blank text to deliver
    Chunk(String),
    /// The producer finished the turn
    Done,
    /// Nothing to deliver; keep reading
    Skip,
}

/// Pluggable payload format.
///
/// Connections use [`DefaultPayloadParser`] unless given another one.
pub trait PayloadParser: Send + Sync {
    fn parse(&self, raw: &str) -> Payload;
}

/// Sentinel, OpenAI delta, flat `message`, and wrapped `content` formats
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPayloadParser;

impl PayloadParser for DefaultPayloadParser {
    fn parse(&self, raw: &str) -> Payload {
        parse_payload(raw)
    }
}

/// Parse one payload. Shapes are tried in order:
///
/// 1. `[DONE]` sentinel, or `type` of `done` / `finish`
/// 2. `choices[0].delta.content`
/// 3. `message`, when `type` is absent or `content`
/// 4. `content`, when `type` is absent or `content`; unwrapped first when it
///    holds a well-formed `Name(content=..., ...)` record
pub fn parse_payload(raw: &str) -> Payload {
    let data = raw.trim();
    if data.is_empty() {
        return Payload::Skip;
    }
    if data == DONE_SENTINEL {
        return Payload::Done;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, payload = %preview(data), "Failed to parse SSE payload; skipping");
            return Payload::Skip;
        }
    };

    let kind = value.get("type").and_then(Value::as_str);
    if matches!(kind, Some("done") | Some("finish")) {
        return Payload::Done;
    }

    if let Some(delta) = value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        return chunk(delta);
    }

    if matches!(kind, None | Some("content")) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return chunk(message);
        }
        if let Some(content) = value.get("content").and_then(Value::as_str) {
            return content_chunk(content);
        }
    }

    if kind == Some("error") {
        let message = value
            .get("message")
            .or_else(|| value.get("error"))
            .map(|v| v.to_string())
            .unwrap_or_default();
        tracing::warn!(message = %message, "Server reported an error payload; skipping");
    } else {
        tracing::debug!(kind = ?kind, "Ignoring payload without deliverable text");
    }
    Payload::Skip
}

/// `content` holding a `Name(...)` record is unwrapped only when it parses
/// and carries a `content` field; anything else is ordinary text such as
/// `print(x)`.
fn content_chunk(content: &str) -> Payload {
    if looks_like_record(content) {
        match WrapperRecord::parse(content) {
            Ok(record) if record.get("content").is_some() => {
                return match WorkflowEventMessage::from_record(record).content {
                    Some(text) => chunk(&text),
                    None => Payload::Skip,
                };
            }
            Ok(record) => {
                tracing::debug!(name = %record.name, "Record-shaped content has no content field; delivering as text");
            }
            Err(e) => {
                tracing::debug!(error = %e, payload = %preview(content), "Content is not a wrapped record; delivering as text");
            }
        }
    }
    chunk(content)
}

fn chunk(text: &str) -> Payload {
    if text.trim().is_empty() {
        Payload::Skip
    } else {
        Payload::Chunk(text.to_string())
    }
}

fn preview(s: &str) -> String {
    const MAX_CHARS: usize = 120;
    if s.chars().count() <= MAX_CHARS {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}
