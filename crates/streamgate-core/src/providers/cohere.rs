//! Cohere chat streams: newline-delimited JSON with an `is_finished` flag.

use super::{ChunkParser, parse_json};
use crate::error::GateError;
use crate::types::{RawChunk, StreamChunk};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereStreamLine {
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Parser for Cohere NDJSON lines
#[derive(Debug, Clone, Copy, Default)]
pub struct CohereParser;

impl ChunkParser for CohereParser {
    fn parse(&mut self, raw: &RawChunk) -> Result<StreamChunk, GateError> {
        let line: CohereStreamLine = parse_json("cohere", raw)?;

        if line.is_finished {
            return Ok(match line.finish_reason.as_deref() {
                Some(reason @ ("ERROR" | "ERROR_TOXIC")) => {
                    StreamChunk::error(raw.sequence, format!("Cohere finished with {reason}"))
                }
                _ => StreamChunk::done(raw.sequence),
            });
        }

        Ok(match line.text {
            Some(text) if !text.is_empty() => StreamChunk::delta(raw.sequence, text),
            _ => StreamChunk::event(raw.sequence, raw.payload.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkKind;

    fn parse(payload: &str) -> StreamChunk {
        CohereParser.parse(&RawChunk::new(0, payload)).unwrap()
    }

    #[test]
    fn text_generation_lines_are_deltas() {
        let chunk = parse(r#"{"is_finished":false,"event_type":"text-generation","text":"Hi"}"#);
        assert_eq!(chunk.text_delta(), Some("Hi"));
    }

    #[test]
    fn stream_start_is_an_event() {
        let chunk = parse(r#"{"is_finished":false,"event_type":"stream-start","generation_id":"g"}"#);
        assert_eq!(chunk.kind, ChunkKind::Event);
    }

    #[test]
    fn finished_line_ends_stream() {
        let chunk = parse(r#"{"is_finished":true,"event_type":"stream-end","finish_reason":"COMPLETE"}"#);
        assert_eq!(chunk.kind, ChunkKind::Done);
    }

    #[test]
    fn error_finish_is_reported() {
        let chunk = parse(r#"{"is_finished":true,"finish_reason":"ERROR"}"#);
        assert_eq!(chunk.kind, ChunkKind::Error);
        assert_eq!(chunk.payload, "Cohere finished with ERROR");
    }
}
