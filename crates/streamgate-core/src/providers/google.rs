//! Google Gemini `streamGenerateContent?alt=sse` responses.
//!
//! Each event is a full `GenerateContentResponse` whose candidate carries the
//! next slice of text. There is no explicit terminator; the stream is done
//! when the connection closes.

use super::{ChunkParser, parse_json};
use crate::error::GateError;
use crate::types::{RawChunk, StreamChunk};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub error: Option<GoogleError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleError {
    #[serde(default)]
    pub code: Option<u16>,
    pub message: String,
}

/// Parser for Gemini server-sent events
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleParser;

impl ChunkParser for GoogleParser {
    fn parse(&mut self, raw: &RawChunk) -> Result<StreamChunk, GateError> {
        let response: GenerateContentResponse = parse_json("google", raw)?;

        if let Some(error) = response.error {
            return Ok(StreamChunk::error(raw.sequence, error.message));
        }
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Ok(StreamChunk::error(
                raw.sequence,
                format!("Prompt blocked: {reason}"),
            ));
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Ok(StreamChunk::event(raw.sequence, raw.payload.as_str()));
        };

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let chunk = if text.is_empty() {
            StreamChunk::event(raw.sequence, raw.payload.as_str())
        } else {
            StreamChunk::delta(raw.sequence, text)
        };
        Ok(match candidate.finish_reason {
            Some(reason) => chunk.with_metadata(serde_json::json!({ "finish_reason": reason })),
            None => chunk,
        })
    }
}
