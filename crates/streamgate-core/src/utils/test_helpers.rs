//! Test utilities for simulating provider responses
//!
//! This module provides helpers for creating realistic SSE and NDJSON byte
//! streams in unit tests, plus a scripted [`MockTransport`] whose reads and
//! closing can be observed from the outside.

use crate::error::GateError;
use crate::transport::ProviderTransport;
use crate::types::RawChunk;
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// Error type yielded by the fake byte streams
#[derive(Debug, Clone)]
pub struct FakeStreamError(pub String);

impl std::fmt::Display for FakeStreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FakeStreamError {}

/// Configuration for fake SSE response generation
#[derive(Debug, Clone, Default)]
pub struct FakeSseConfig {
    /// Whether to append a final "[DONE]" event
    pub include_done: bool,
    /// Split events across multiple chunks to test partial frame handling
    pub chunk_size: Option<usize>,
}

/// Creates a fake SSE response stream for testing
///
/// # Arguments
/// * `events` - Array of event data (without "data: " prefix)
/// * `config` - Optional configuration for response behavior
pub fn fake_sse_response(
    events: &[&str],
    config: Option<FakeSseConfig>,
) -> FakeByteStream {
    let config = config.unwrap_or_default();

    let mut response = String::new();
    for event in events {
        response.push_str(&format!("data: {event}\n\n"));
    }

    if config.include_done {
        response.push_str("data: [DONE]\n\n");
    }

    FakeByteStream::new(response, config.chunk_size)
}

/// Creates a fake SSE response with events split across chunk boundaries
pub fn fake_sse_response_chunked(events: &[&str], chunk_size: usize) -> FakeByteStream {
    fake_sse_response(
        events,
        Some(FakeSseConfig {
            chunk_size: Some(chunk_size),
            ..Default::default()
        }),
    )
}

/// Creates a fake SSE response that includes a [DONE] event at the end
pub fn fake_sse_response_with_done(events: &[&str]) -> FakeByteStream {
    fake_sse_response(
        events,
        Some(FakeSseConfig {
            include_done: true,
            ..Default::default()
        }),
    )
}

/// Creates a fake newline-delimited JSON response
pub fn fake_ndjson_response(
    lines: &[&str],
    chunk_size: Option<usize>,
    trailing_newline: bool,
) -> FakeByteStream {
    let mut response = lines.join("\n");
    if trailing_newline && !lines.is_empty() {
        response.push('\n');
    }
    FakeByteStream::new(response, chunk_size)
}

/// Byte stream that replays a fixed body, optionally in small pieces
pub struct FakeByteStream {
    data: Vec<u8>,
    position: usize,
    chunk_size: Option<usize>,
}

impl FakeByteStream {
    fn new(response: String, chunk_size: Option<usize>) -> Self {
        Self {
            data: response.into_bytes(),
            position: 0,
            chunk_size,
        }
    }
}

impl Stream for FakeByteStream {
    type Item = Result<bytes::Bytes, FakeStreamError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.position >= self.data.len() {
            return Poll::Ready(None);
        }

        // Determine chunk size (use configured size or remaining data)
        let chunk_size = self.chunk_size.unwrap_or(self.data.len() - self.position);
        let end_pos = std::cmp::min(self.position + chunk_size, self.data.len());

        let chunk = self.data[self.position..end_pos].to_vec();
        self.position = end_pos;

        Poll::Ready(Some(Ok(bytes::Bytes::from(chunk))))
    }
}

/// Observes a [`MockTransport`] after it has been moved into an adapter
#[derive(Debug, Clone, Default)]
pub struct TransportTap {
    reads: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl TransportTap {
    /// Number of `next_chunk` calls made so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Scripted provider transport
pub struct MockTransport {
    items: VecDeque<Result<String, GateError>>,
    hang_at_end: bool,
    next_sequence: u64,
    tap: TransportTap,
}

impl MockTransport {
    pub fn from_payloads(payloads: &[&str]) -> Self {
        Self {
            items: payloads.iter().map(|p| Ok(p.to_string())).collect(),
            hang_at_end: false,
            next_sequence: 0,
            tap: TransportTap::default(),
        }
    }

    /// Fail with `error` once the scripted payloads run out
    pub fn then_fail(mut self, error: GateError) -> Self {
        self.items.push_back(Err(error));
        self
    }

    /// Never finish once the scripted payloads run out
    pub fn then_hang(mut self) -> Self {
        self.hang_at_end = true;
        self
    }

    pub fn tap(&self) -> TransportTap {
        self.tap.clone()
    }
}

#[async_trait::async_trait]
impl ProviderTransport for MockTransport {
    async fn next_chunk(&mut self) -> Result<Option<RawChunk>, GateError> {
        self.tap.reads.fetch_add(1, Ordering::SeqCst);
        if self.tap.is_closed() {
            return Ok(None);
        }

        match self.items.pop_front() {
            Some(Ok(payload)) => {
                let chunk = RawChunk::new(self.next_sequence, payload);
                self.next_sequence += 1;
                Ok(Some(chunk))
            }
            Some(Err(e)) => Err(e),
            None if self.hang_at_end => futures::future::pending().await,
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.tap.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_basic_fake_sse_response() {
        let chunks: Vec<_> = fake_sse_response(&["hello", "world"], None).collect().await;

        assert_eq!(chunks.len(), 1);
        let data = String::from_utf8(chunks[0].as_ref().unwrap().to_vec()).unwrap();
        assert_eq!(data, "data: hello\n\ndata: world\n\n");
    }

    #[tokio::test]
    async fn test_fake_sse_response_chunked() {
        let chunks: Vec<_> = fake_sse_response_chunked(&["hello", "world"], 5)
            .collect()
            .await;

        assert!(chunks.len() > 1);

        let mut full_data = String::new();
        for chunk in chunks {
            let bytes = chunk.unwrap();
            full_data.push_str(core::str::from_utf8(&bytes).unwrap());
        }
        assert_eq!(full_data, "data: hello\n\ndata: world\n\n");
    }

    #[tokio::test]
    async fn test_empty_events() {
        let chunks: Vec<_> = fake_sse_response(&[], None).collect().await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_mock_transport_script() {
        let mut transport =
            MockTransport::from_payloads(&["a"]).then_fail(GateError::transport("gone", ""));
        let tap = transport.tap();

        assert_eq!(transport.next_chunk().await.unwrap(), Some(RawChunk::new(0, "a")));
        assert!(transport.next_chunk().await.is_err());
        transport.close();
        assert!(transport.next_chunk().await.unwrap().is_none());
        assert_eq!(tap.reads(), 3);
        assert!(tap.is_closed());
    }
}
