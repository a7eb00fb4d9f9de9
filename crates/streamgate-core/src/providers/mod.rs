//! Provider-specific chunk parsers.
//!
//! A parser is picked once when an adapter is built, either from a known
//! [`ProviderKind`] or injected by the caller as a closure.

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod openai;

use crate::error::GateError;
use crate::transport::WireFormat;
use crate::types::{RawChunk, StreamChunk};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub use anthropic::AnthropicParser;
pub use cohere::CohereParser;
pub use google::GoogleParser;
pub use openai::OpenAIParser;

/// Turns one provider-native payload into a classified [`StreamChunk`].
///
/// Returning `Err` is a fatal parse failure and terminates the stream.
pub trait ChunkParser: Send {
    fn parse(&mut self, raw: &RawChunk) -> Result<StreamChunk, GateError>;
}

impl<F> ChunkParser for F
where
    F: FnMut(&RawChunk) -> Result<StreamChunk, GateError> + Send,
{
    fn parse(&mut self, raw: &RawChunk) -> Result<StreamChunk, GateError> {
        self(raw)
    }
}

/// Build a parser from a function that only extracts a text delta.
///
/// Payloads for which `extract` returns `None` are treated as metadata events;
/// the stream ends when the transport closes.
pub fn delta_parser<F>(mut extract: F) -> impl ChunkParser
where
    F: FnMut(&str) -> Option<String> + Send,
{
    move |raw: &RawChunk| -> Result<StreamChunk, GateError> {
        Ok(match extract(&raw.payload) {
            Some(text) => StreamChunk::delta(raw.sequence, text),
            None => StreamChunk::event(raw.sequence, raw.payload.as_str()),
        })
    }
}

/// Passes every payload through as text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl ChunkParser for TextParser {
    fn parse(&mut self, raw: &RawChunk) -> Result<StreamChunk, GateError> {
        Ok(StreamChunk::delta(raw.sequence, raw.payload.as_str()))
    }
}

/// Providers with a built-in parser
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    #[strum(serialize = "openai", serialize = "gpt")]
    OpenAI,
    #[strum(serialize = "anthropic", serialize = "claude")]
    Anthropic,
    #[strum(serialize = "google", serialize = "gemini")]
    Google,
    Cohere,
    Text,
}

impl ProviderKind {
    /// Canonical provider identifier used in logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Cohere => "cohere",
            ProviderKind::Text => "text",
        }
    }

    /// Framing the provider uses for streamed responses
    pub fn wire_format(&self) -> WireFormat {
        match self {
            ProviderKind::OpenAI | ProviderKind::Anthropic | ProviderKind::Google => {
                WireFormat::Sse
            }
            ProviderKind::Cohere => WireFormat::Ndjson,
            ProviderKind::Text => WireFormat::Raw,
        }
    }

    pub fn parser(&self) -> Box<dyn ChunkParser> {
        match self {
            ProviderKind::OpenAI => Box::new(OpenAIParser),
            ProviderKind::Anthropic => Box::new(AnthropicParser),
            ProviderKind::Google => Box::new(GoogleParser),
            ProviderKind::Cohere => Box::new(CohereParser),
            ProviderKind::Text => Box::new(TextParser),
        }
    }
}

/// Parse a JSON payload, reporting the provider on failure
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    raw: &RawChunk,
) -> Result<T, GateError> {
    serde_json::from_str(&raw.payload).map_err(|e| {
        GateError::serialization(
            format!("Failed to parse {provider} chunk #{}: {e}", raw.sequence),
            e,
        )
    })
}
