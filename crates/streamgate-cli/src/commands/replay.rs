use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use streamgate_core::{
    ChunkStreamTransport, ProviderKind, StreamAdapter, StreamCallbacks, WireFormat,
};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::commands::{cancel_on_ctrl_c, print_stream};
use crate::output::{self, OutputLevel};
use crate::spinner::Spinner;

#[derive(Args)]
pub struct ReplayArgs {
    /// Captured response body; reads stdin when omitted
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Provider whose format the capture is in (openai, anthropic, google, cohere, text)
    #[arg(short, long, default_value = "openai")]
    pub provider: ProviderKind,

    /// Wire format override (sse, ndjson, raw); defaults to the provider's own
    #[arg(short, long)]
    pub format: Option<WireFormat>,

    /// Cancel the stream after this many tokens
    #[arg(long)]
    pub max_tokens: Option<usize>,
}

impl ReplayArgs {
    pub async fn run(&self, output_level: OutputLevel) -> Result<()> {
        let reader: Box<dyn AsyncRead + Unpin + Send> = match &self.input {
            Some(path) => Box::new(
                tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?,
            ),
            None => Box::new(tokio::io::stdin()),
        };

        let format = self.format.unwrap_or_else(|| self.provider.wire_format());
        let transport = ChunkStreamTransport::framed(ReaderStream::new(reader), format);

        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(&cancel);

        let completed = Arc::new(Mutex::new(None));
        let mut callbacks = StreamCallbacks::new().on_final({
            let completed = completed.clone();
            move |text: &str| {
                if let Ok(mut slot) = completed.lock() {
                    *slot = Some(text.chars().count());
                }
            }
        });
        if let Some(max_tokens) = self.max_tokens {
            let cancel = cancel.clone();
            let mut seen = 0;
            callbacks = callbacks.on_token(move |_| {
                seen += 1;
                if seen >= max_tokens {
                    cancel.cancel();
                }
            });
        }

        let mut adapter = StreamAdapter::for_provider(transport, self.provider)
            .with_callbacks(callbacks)
            .with_cancellation(cancel);

        log::debug!(
            "Replaying {} capture as {format}",
            output::format_provider(self.provider.name())
        );
        let summary = print_stream(adapter.stream()?, Spinner::start("Replaying")).await?;

        if summary.cancelled {
            output::warning(
                &format!("Stream cancelled after {} tokens", summary.tokens),
                output_level,
            );
        } else if let Ok(Some(chars)) = completed.lock().map(|slot| *slot) {
            output::success(
                &format!("Completed: {} tokens, {chars} chars", summary.tokens),
                output_level,
            );
        }
        Ok(())
    }
}
