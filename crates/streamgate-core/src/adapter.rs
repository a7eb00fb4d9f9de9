//! The stream adapter: provider chunks in, normalized tokens out.

use crate::callbacks::StreamCallbacks;
use crate::error::GateError;
use crate::providers::{ChunkParser, ProviderKind};
use crate::transport::{ChunkStreamTransport, ProviderTransport};
use crate::types::{ChunkKind, NormalizedToken, RawChunk, StreamResult, TokenStream};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Everything the output stream takes ownership of when it is created
struct AdapterParts {
    transport: Box<dyn ProviderTransport>,
    parser: Box<dyn ChunkParser>,
    callbacks: StreamCallbacks,
    cancel: CancellationToken,
}

/// Single-use adapter from a provider transport to a normalized token stream.
///
/// The output can be taken exactly once; later attempts fail with
/// [`GateError::StreamAlreadyConsumed`].
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use streamgate_core::{ChunkStreamTransport, ProviderKind, StreamAdapter, StreamCallbacks};
///
/// # async fn relay(response: reqwest::Response) -> Result<(), streamgate_core::GateError> {
/// let transport = ChunkStreamTransport::from_response(response, ProviderKind::Anthropic.wire_format()).await?;
/// let mut adapter = StreamAdapter::for_provider(transport, ProviderKind::Anthropic)
///     .with_callbacks(StreamCallbacks::new().on_completion(|text| println!("\n{} chars", text.len())));
///
/// let mut tokens = adapter.stream()?;
/// while let Some(token) = tokens.next().await {
///     print!("{}", token?.text);
/// }
/// # Ok(())
/// # }
/// ```
pub struct StreamAdapter {
    parts: Option<AdapterParts>,
    label: String,
}

impl StreamAdapter {
    /// Build an adapter with an explicit parser
    pub fn new(
        transport: impl ProviderTransport + 'static,
        parser: impl ChunkParser + 'static,
    ) -> Self {
        Self::from_parts(Box::new(transport), Box::new(parser), "custom")
    }

    /// Build an adapter using the built-in parser for `provider`
    pub fn for_provider(transport: impl ProviderTransport + 'static, provider: ProviderKind) -> Self {
        Self::from_parts(Box::new(transport), provider.parser(), provider.name())
    }

    /// Build an adapter straight from a provider HTTP response
    pub async fn from_response(
        response: reqwest::Response,
        provider: ProviderKind,
    ) -> Result<Self, GateError> {
        let transport = ChunkStreamTransport::from_response(response, provider.wire_format()).await?;
        Ok(Self::for_provider(transport, provider))
    }

    fn from_parts(
        transport: Box<dyn ProviderTransport>,
        parser: Box<dyn ChunkParser>,
        label: &str,
    ) -> Self {
        Self {
            parts: Some(AdapterParts {
                transport,
                parser,
                callbacks: StreamCallbacks::default(),
                cancel: CancellationToken::new(),
            }),
            label: label.to_string(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: StreamCallbacks) -> Self {
        if let Some(parts) = self.parts.as_mut() {
            parts.callbacks = callbacks;
        }
        self
    }

    /// Stop the stream from outside; honored at every suspension point
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        if let Some(parts) = self.parts.as_mut() {
            parts.cancel = token;
        }
        self
    }

    /// Name used in logs and metric labels
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_consumed(&self) -> bool {
        self.parts.is_none()
    }

    /// Take the output stream. Fails if it was already taken.
    pub fn stream(&mut self) -> Result<TokenStream, GateError> {
        let parts = self.parts.take().ok_or(GateError::StreamAlreadyConsumed)?;
        Ok(drive(parts, self.label.clone()))
    }

    /// Output as plain text fragments
    pub fn text_stream(&mut self) -> Result<StreamResult<String>, GateError> {
        let tokens = self.stream()?;
        Ok(Box::pin(tokens.map(|token| token.map(|t| t.text))))
    }

    /// Output as body chunks for a streaming HTTP response
    pub fn byte_stream(&mut self) -> Result<StreamResult<bytes::Bytes>, GateError> {
        let tokens = self.stream()?;
        Ok(Box::pin(
            tokens.map(|token| token.map(|t| bytes::Bytes::from(t.text))),
        ))
    }

    /// Read the whole response into one string
    pub async fn collect_text(&mut self) -> Result<String, GateError> {
        let mut tokens = self.stream()?;
        let mut text = String::new();
        while let Some(token) = tokens.next().await {
            text.push_str(&token?.text);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for StreamAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("label", &self.label)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Closes the transport when the output stream is dropped early
struct TransportGuard(Box<dyn ProviderTransport>);

impl TransportGuard {
    async fn next_chunk(&mut self) -> Result<Option<RawChunk>, GateError> {
        self.0.next_chunk().await
    }

    fn close(&mut self) {
        self.0.close();
    }
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

enum Step {
    Cancelled,
    Read(Result<Option<RawChunk>, GateError>),
}

fn drive(parts: AdapterParts, label: String) -> TokenStream {
    let AdapterParts {
        transport,
        mut parser,
        mut callbacks,
        cancel,
    } = parts;

    Box::pin(async_stream::stream! {
        let mut transport = TransportGuard(transport);
        let mut accumulated = String::new();
        let mut started = false;
        let mut completed = false;

        log::debug!("Starting {label} stream");

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                read = transport.next_chunk() => Step::Read(read),
            };

            let read = match step {
                Step::Cancelled => {
                    transport.close();
                    log::debug!(
                        "{label} stream cancelled after {} bytes",
                        accumulated.len()
                    );
                    yield Err(GateError::cancelled(accumulated.as_str()));
                    break;
                }
                Step::Read(read) => read,
            };

            let raw = match read {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    completed = true;
                    break;
                }
                Err(e) => {
                    transport.close();
                    log::warn!("{label} transport failed: {e}");
                    yield Err(e.with_partial_text(&accumulated));
                    break;
                }
            };

            if !started {
                started = true;
                callbacks.start();
            }

            let chunk = match parser.parse(&raw) {
                Ok(chunk) => chunk,
                Err(e) => {
                    transport.close();
                    log::warn!("Failed to parse {label} chunk #{}: {e}", raw.sequence);
                    yield Err(e.with_partial_text(&accumulated));
                    break;
                }
            };

            match chunk.kind {
                ChunkKind::Delta => {
                    if let Some(text) = chunk.text_delta() {
                        accumulated.push_str(text);
                        callbacks.token(text);
                        yield Ok(NormalizedToken {
                            text: text.to_string(),
                            sequence: chunk.sequence,
                            metadata: chunk.metadata.clone(),
                        });
                    }
                }
                ChunkKind::Event => {}
                ChunkKind::Done => {
                    transport.close();
                    completed = true;
                    break;
                }
                ChunkKind::Error => {
                    transport.close();
                    log::warn!("{label} reported an error: {}", chunk.payload);
                    yield Err(GateError::transport(
                        format!("{label} error: {}", chunk.payload),
                        accumulated.as_str(),
                    ));
                    break;
                }
            }
        }

        if completed {
            if !started {
                callbacks.start();
            }
            callbacks.complete(&accumulated);
            log::debug!("{label} stream completed with {} bytes", accumulated.len());
        }
    })
}
