//! Provider transports: where raw chunks come from.
//!
//! A transport hands out provider-native payloads one at a time and can be
//! closed early. The adapter never reads ahead, so a transport is only ever
//! asked for the next chunk once the previous one has been consumed
//! downstream.

use crate::error::GateError;
use crate::types::RawChunk;
use crate::utils::ndjson::ndjson_lines;
use crate::utils::sse::{TextDecoder, sse_events};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use strum_macros::{Display, EnumString};

/// Minimal capability set the adapter needs from a provider connection
#[async_trait::async_trait]
pub trait ProviderTransport: Send {
    /// Wait for the next raw chunk. `Ok(None)` means the provider closed the stream.
    async fn next_chunk(&mut self) -> Result<Option<RawChunk>, GateError>;

    /// Release the underlying connection. Must be idempotent.
    fn close(&mut self);
}

/// How raw chunks are framed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum WireFormat {
    /// Server-sent events; each `data` field is one chunk
    Sse,
    /// Newline-delimited JSON; each line is one chunk
    Ndjson,
    /// Unframed text; each network read is one chunk
    Raw,
}

type PayloadStream = Pin<Box<dyn Stream<Item = Result<String, GateError>> + Send>>;

/// Transport over any stream of payload strings
pub struct ChunkStreamTransport {
    inner: Option<PayloadStream>,
    next_sequence: u64,
}

impl ChunkStreamTransport {
    /// Wrap a stream that already yields one payload per item, such as a
    /// provider SDK iterator.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, E>> + Send + 'static,
        E: Into<GateError>,
    {
        Self::from_payloads(Box::pin(stream.map(|item| item.map_err(Into::into))))
    }

    /// Frame a byte stream as server-sent events
    pub fn sse<S, E>(bytes: S) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_payloads(Box::pin(
            sse_events(bytes).map(|event| event.map(|event| event.data)),
        ))
    }

    /// Frame a byte stream as newline-delimited JSON
    pub fn ndjson<S, E>(bytes: S) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_payloads(Box::pin(ndjson_lines(bytes)))
    }

    /// Treat every read of a byte stream as a text chunk.
    ///
    /// Text is passed through byte for byte. Bytes still pending when the
    /// stream ends are flushed, or reported as a serialization error if they
    /// are not valid UTF-8.
    pub fn raw<S, E>(bytes: S) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let text = async_stream::stream! {
            let mut bytes = bytes;
            let mut decoder = TextDecoder::passthrough();
            while let Some(item) = bytes.next().await {
                match item {
                    Ok(read) => match decoder.push(&read) {
                        Ok(text) if text.is_empty() => {}
                        Ok(text) => yield Ok(text),
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
                    Err(e) => {
                        yield Err(GateError::transport_with_source(
                            format!("Stream error: {e}"),
                            "",
                            e,
                        ));
                        return;
                    }
                }
            }
            match decoder.finish() {
                Ok(text) if text.is_empty() => {}
                other => yield other,
            }
        };
        Self::from_payloads(Box::pin(text))
    }

    /// Frame a byte stream according to `format`
    pub fn framed<S, E>(bytes: S, format: WireFormat) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        match format {
            WireFormat::Sse => Self::sse(bytes),
            WireFormat::Ndjson => Self::ndjson(bytes),
            WireFormat::Raw => Self::raw(bytes),
        }
    }

    /// Take over the body of a provider HTTP response.
    ///
    /// Non-success statuses are turned into a transport error carrying the
    /// response body.
    pub async fn from_response(
        response: reqwest::Response,
        format: WireFormat,
    ) -> Result<Self, GateError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GateError::transport(
                format!("Provider returned {status}: {error_text}"),
                "",
            ));
        }

        Ok(Self::framed(response.bytes_stream(), format))
    }

    fn from_payloads(inner: PayloadStream) -> Self {
        Self {
            inner: Some(inner),
            next_sequence: 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

#[async_trait::async_trait]
impl ProviderTransport for ChunkStreamTransport {
    async fn next_chunk(&mut self) -> Result<Option<RawChunk>, GateError> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };

        match inner.next().await {
            Some(Ok(payload)) => {
                let chunk = RawChunk::new(self.next_sequence, payload);
                self.next_sequence += 1;
                Ok(Some(chunk))
            }
            Some(Err(e)) => {
                self.close();
                Err(e)
            }
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        // Dropping the body stream aborts the HTTP connection
        if self.inner.take().is_some() {
            log::debug!("Closed provider transport after {} chunks", self.next_sequence);
        }
    }
}
