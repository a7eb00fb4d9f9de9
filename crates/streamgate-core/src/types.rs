use crate::error::GateError;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// One unit of raw data received from a provider transport, before parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Position in arrival order, starting at 0
    pub sequence: u64,
    /// Provider-native payload (an SSE `data` field, an NDJSON line, ...)
    pub payload: String,
}

impl RawChunk {
    pub fn new(sequence: u64, payload: impl Into<String>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }
}

/// What a parsed chunk means for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Incremental text
    Delta,
    /// Control or metadata event with no text (pings, block starts, usage)
    Event,
    /// The provider signalled the end of the response
    Done,
    /// The provider reported an error in-band
    Error,
}

/// A raw chunk after the provider parser classified it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub kind: ChunkKind,
    /// Text for deltas, error message for errors, raw payload otherwise
    pub payload: String,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl StreamChunk {
    pub fn delta(sequence: u64, text: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Delta,
            payload: text.into(),
            sequence,
            metadata: None,
        }
    }

    pub fn event(sequence: u64, payload: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Event,
            payload: payload.into(),
            sequence,
            metadata: None,
        }
    }

    pub fn done(sequence: u64) -> Self {
        Self {
            kind: ChunkKind::Done,
            payload: String::new(),
            sequence,
            metadata: None,
        }
    }

    pub fn error(sequence: u64, message: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Error,
            payload: message.into(),
            sequence,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The text delta carried by this chunk, if it has one worth emitting
    pub fn text_delta(&self) -> Option<&str> {
        match self.kind {
            ChunkKind::Delta if !self.payload.is_empty() => Some(&self.payload),
            _ => None,
        }
    }
}

/// Output unit of the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedToken {
    pub text: String,
    /// Sequence of the raw chunk this token was parsed from
    pub sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NormalizedToken {
    pub fn new(sequence: u64, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sequence,
            metadata: None,
        }
    }
}

/// Type alias for streaming results
pub type StreamResult<T> = Pin<Box<dyn futures::Stream<Item = Result<T, GateError>> + Send>>;

/// Stream of normalized tokens produced by a [`StreamAdapter`](crate::StreamAdapter)
pub type TokenStream = StreamResult<NormalizedToken>;
