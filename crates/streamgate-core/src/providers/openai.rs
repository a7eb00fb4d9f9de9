//! OpenAI (and OpenAI-compatible: Groq, OpenRouter, ...) streaming chunks.
//!
//! Chat completions carry text in `choices[].delta.content`, the legacy
//! completions endpoint in `choices[].text`. The stream ends with a literal
//! `[DONE]` payload.

use super::{ChunkParser, parse_json};
use crate::error::GateError;
use crate::types::{RawChunk, StreamChunk};
use serde::{Deserialize, Serialize};

/// One `chat.completion.chunk` (or `text_completion`) payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    /// Legacy completions text
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

/// Parser for OpenAI server-sent chunks
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAIParser;

impl ChunkParser for OpenAIParser {
    fn parse(&mut self, raw: &RawChunk) -> Result<StreamChunk, GateError> {
        if raw.payload.trim() == "[DONE]" {
            return Ok(StreamChunk::done(raw.sequence));
        }

        let chunk: ChatCompletionChunk = parse_json("openai", raw)?;

        if let Some(error) = chunk.error {
            return Ok(StreamChunk::error(raw.sequence, error.message));
        }

        let mut text = String::new();
        let mut finish_reason = None;
        for choice in &chunk.choices {
            if let Some(content) = choice.delta.as_ref().and_then(|d| d.content.as_deref()) {
                text.push_str(content);
            } else if let Some(content) = choice.text.as_deref() {
                text.push_str(content);
            }
            if choice.finish_reason.is_some() {
                finish_reason = choice.finish_reason.clone();
            }
        }

        if text.is_empty() {
            return Ok(StreamChunk::event(raw.sequence, raw.payload.as_str()));
        }

        let chunk = StreamChunk::delta(raw.sequence, text);
        Ok(match finish_reason {
            Some(reason) => chunk.with_metadata(serde_json::json!({ "finish_reason": reason })),
            None => chunk,
        })
    }
}
