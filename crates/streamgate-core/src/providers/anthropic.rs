//! Anthropic streaming events.
//!
//! Messages API streams are typed events (`message_start`,
//! `content_block_delta`, ..., `message_stop`). The older text completions
//! API streamed `{"completion": "..."}` objects and simply closed the
//! connection when finished; both are accepted.

use super::{ChunkParser, parse_json};
use crate::error::GateError;
use crate::types::{RawChunk, StreamChunk};
use serde::{Deserialize, Serialize};

/// Streaming event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Start of message
    MessageStart { message: serde_json::Value },
    /// Start of content block
    ContentBlockStart {
        index: u32,
        content_block: serde_json::Value,
    },
    /// Incremental content
    ContentBlockDelta { index: u32, delta: Delta },
    /// End of content block
    ContentBlockStop { index: u32 },
    /// Stop reason and usage for the whole message
    MessageDelta {
        delta: serde_json::Value,
        #[serde(default)]
        usage: Option<serde_json::Value>,
    },
    /// End of stream
    MessageStop,
    /// Ping event (keep-alive)
    Ping,
    /// Error event
    Error { error: ErrorData },
    /// Event types added after this parser was written
    #[serde(other)]
    Unknown,
}

/// Delta (incremental change)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    /// Text delta
    TextDelta {
        #[serde(default)]
        text: String,
    },
    /// Tool input delta
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Legacy `/v1/complete` streaming payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyCompletion {
    pub completion: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Parser for Anthropic server-sent events
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicParser;

impl ChunkParser for AnthropicParser {
    fn parse(&mut self, raw: &RawChunk) -> Result<StreamChunk, GateError> {
        let value: serde_json::Value = parse_json("anthropic", raw)?;

        if value.get("completion").is_some() {
            let legacy: LegacyCompletion = serde_json::from_value(value)?;
            return Ok(StreamChunk::delta(raw.sequence, legacy.completion));
        }

        let event: StreamEvent = serde_json::from_value(value)?;
        Ok(match event {
            StreamEvent::ContentBlockDelta {
                index,
                delta: Delta::TextDelta { text },
            } => StreamChunk::delta(raw.sequence, text)
                .with_metadata(serde_json::json!({ "index": index })),
            StreamEvent::MessageStop => StreamChunk::done(raw.sequence),
            StreamEvent::Error { error } => StreamChunk::error(
                raw.sequence,
                format!("{}: {}", error.error_type, error.message),
            ),
            _ => StreamChunk::event(raw.sequence, raw.payload.as_str()),
        })
    }
}
