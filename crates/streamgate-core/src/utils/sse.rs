use crate::error::GateError;
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A single dispatched Server-Sent Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if the block had one
    pub event: Option<String>,
    /// All `data:` lines of the block joined with `\n`
    pub data: String,
}

/// Parses Server-Sent Events (SSE) from a byte stream.
///
/// `[DONE]` sentinels are passed through untouched; deciding what they mean is
/// left to the provider parser.
pub fn sse_events<S, E>(stream: S) -> impl Stream<Item = Result<SseEvent, GateError>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    SseParser::new(stream)
}

/// Incremental UTF-8 decoder that tolerates code points and CRLF pairs split
/// across chunk boundaries.
#[derive(Debug)]
pub(crate) struct TextDecoder {
    pending: Vec<u8>,
    fold_crlf: bool,
}

impl Default for TextDecoder {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            fold_crlf: true,
        }
    }
}

impl TextDecoder {
    /// Decoder for unframed text: bytes are decoded as-is, line endings included.
    pub(crate) fn passthrough() -> Self {
        Self {
            pending: Vec::new(),
            fold_crlf: false,
        }
    }

    /// Decode as much of `pending + bytes` as is complete, with CRLF folded to
    /// LF unless this is a passthrough decoder.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<String, GateError> {
        self.pending.extend_from_slice(bytes);

        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: keep it for the next chunk
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                self.pending.clear();
                return Err(GateError::serialization("Invalid UTF-8 in provider stream", e));
            }
        };

        let mut end = valid_up_to;
        if self.fold_crlf && end > 0 && self.pending[end - 1] == b'\r' {
            end -= 1;
        }

        let rest = self.pending.split_off(end);
        let decoded = std::mem::replace(&mut self.pending, rest);
        let text = String::from_utf8(decoded)
            .map_err(|e| GateError::serialization("Invalid UTF-8 in provider stream", e))?;
        Ok(self.fold(text))
    }

    /// Flush whatever is left once the source has ended.
    pub(crate) fn finish(&mut self) -> Result<String, GateError> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8(rest)
            .map_err(|e| GateError::serialization("Truncated UTF-8 at end of stream", e))?;
        Ok(self.fold(text))
    }

    fn fold(&self, text: String) -> String {
        if self.fold_crlf {
            text.replace("\r\n", "\n")
        } else {
            text
        }
    }
}

struct SseParser<S> {
    stream: S,
    decoder: TextDecoder,
    buffer: String,
    event_queue: VecDeque<SseEvent>,
    finished: bool,
}

impl<S, E> SseParser<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: TextDecoder::default(),
            buffer: String::new(),
            event_queue: VecDeque::new(),
            finished: false,
        }
    }

    fn parse_events(&mut self) {
        // Split by SSE event delimiter "\n\n"
        while let Some(double_newline_pos) = self.buffer.find("\n\n") {
            let event_block = self.buffer[..double_newline_pos].to_string();
            self.buffer.drain(..double_newline_pos + 2);
            self.dispatch(&event_block);
        }
    }

    fn dispatch(&mut self, block: &str) {
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => data.push(value),
                "event" => event = Some(value.to_string()),
                // id, retry and unknown fields carry nothing the adapter uses
                _ => {}
            }
        }

        if !data.is_empty() {
            self.event_queue.push_back(SseEvent {
                event,
                data: data.join("\n"),
            });
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<SseEvent, GateError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // First, check if we have events in the queue
            if let Some(event) = self.event_queue.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            // No complete events in buffer, try to get more data
            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match self.decoder.push(&bytes) {
                    Ok(text) => {
                        self.buffer.push_str(&text);
                        self.parse_events();
                    }
                    Err(e) => {
                        self.finished = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(GateError::transport_with_source(
                        format!("Stream error: {e}"),
                        "",
                        e,
                    ))));
                }
                Poll::Ready(None) => {
                    // Stream ended, flush the last block even without its blank line
                    self.finished = true;
                    match self.decoder.finish() {
                        Ok(text) => self.buffer.push_str(&text),
                        Err(e) => return Poll::Ready(Some(Err(e))),
                    }
                    self.parse_events();
                    let rest = std::mem::take(&mut self.buffer);
                    if !rest.trim().is_empty() {
                        self.dispatch(&rest);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
