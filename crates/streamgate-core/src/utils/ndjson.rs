use crate::error::GateError;
use crate::utils::sse::TextDecoder;
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Splits a byte stream into newline-delimited lines, skipping blank ones.
pub fn ndjson_lines<S, E>(stream: S) -> impl Stream<Item = Result<String, GateError>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    LineSplitter {
        stream,
        decoder: TextDecoder::default(),
        buffer: String::new(),
        lines: VecDeque::new(),
        finished: false,
    }
}

struct LineSplitter<S> {
    stream: S,
    decoder: TextDecoder,
    buffer: String,
    lines: VecDeque<String>,
    finished: bool,
}

impl<S> LineSplitter<S> {
    fn split_lines(&mut self) {
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim();
            if !line.is_empty() {
                self.lines.push_back(line.to_string());
            }
        }
    }
}

impl<S, E> Stream for LineSplitter<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<String, GateError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match self.decoder.push(&bytes) {
                    Ok(text) => {
                        self.buffer.push_str(&text);
                        self.split_lines();
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
                    self.finished = true;
                    match self.decoder.finish() {
                        Ok(text) => self.buffer.push_str(&text),
                        Err(e) => return Poll::Ready(Some(Err(e))),
                    }
                    self.buffer.push('\n');
                    self.split_lines();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
