use anyhow::Result;
use clap::Subcommand;
use futures::StreamExt;
use std::time::Instant;
use streamgate_core::{FixedWindowRateLimiter, GateConfig, GateError, MemoryStore, TokenStream};
use tokio_util::sync::CancellationToken;

use crate::output;
use crate::spinner::Spinner;

pub mod info;
pub mod limit;
pub mod relay;
pub mod replay;

// Re-export the command args structs
pub use info::InfoArgs;
pub use limit::LimitArgs;
pub use relay::RelayArgs;
pub use replay::ReplayArgs;

// Example strings for after_long_help
const REPLAY_EXAMPLES: &str = r#"EXAMPLES:
  streamgate replay -p openai capture.sse          # Print the text of a captured stream
  streamgate replay -p cohere -f ndjson out.jsonl  # Override the wire format
  streamgate replay -p anthropic --max-tokens 5 x  # Cancel after five tokens"#;

const RELAY_EXAMPLES: &str = r#"EXAMPLES:
  streamgate relay https://api.openai.com/v1/chat/completions -p openai \
    -H "Authorization=Bearer $OPENAI_API_KEY" \
    -b '{"model":"gpt-4o-mini","stream":true,"messages":[{"role":"user","content":"Hi"}]}'
  streamgate relay URL -p anthropic -b @request.json -H "x-api-key: $ANTHROPIC_API_KEY""#;

const LIMIT_EXAMPLES: &str = r#"EXAMPLES:
  streamgate limit 203.0.113.7                     # One check against the configured limit
  streamgate limit 203.0.113.7 -n 7                # Seven checks in a row
  streamgate limit k -n 3 --limit 1 --window 1     # Override limit and window (seconds)"#;

const INFO_EXAMPLES: &str = r#"EXAMPLES:
  streamgate info                                  # Show config path and resolved config"#;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a captured provider response through the stream adapter
    #[command(after_long_help = REPLAY_EXAMPLES)]
    Replay(ReplayArgs),
    /// Call a provider behind the rate limiter and stream normalized output
    #[command(after_long_help = RELAY_EXAMPLES)]
    Relay(RelayArgs),
    /// Issue rate limit checks for a key and print each decision
    #[command(after_long_help = LIMIT_EXAMPLES)]
    Limit(LimitArgs),
    /// Show configuration and build information
    #[command(after_long_help = INFO_EXAMPLES)]
    Info(InfoArgs),
}

/// Build the limiter described by `config`, on Redis when a URL is configured
pub async fn build_limiter(config: &GateConfig) -> Result<FixedWindowRateLimiter> {
    match &config.redis_url {
        #[cfg(feature = "redis")]
        Some(url) => {
            let store = streamgate_core::RedisStore::connect(url).await?;
            Ok(FixedWindowRateLimiter::from_config(store, &config.rate_limit)?)
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            log::warn!("redis_url is set but this build has no Redis support; counting in memory");
            Ok(FixedWindowRateLimiter::from_config(
                MemoryStore::new(),
                &config.rate_limit,
            )?)
        }
        None => {
            log::debug!("Counting requests in memory");
            Ok(FixedWindowRateLimiter::from_config(
                MemoryStore::new(),
                &config.rate_limit,
            )?)
        }
    }
}

/// Cancel `token` on Ctrl-C so the provider connection is released
pub fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::debug!("Interrupted, cancelling stream");
            token.cancel();
        }
    });
}

/// What was printed by [`print_stream`]
#[derive(Debug, Default)]
pub struct StreamSummary {
    pub tokens: usize,
    pub chars: usize,
    pub cancelled: bool,
}

/// Print tokens to stdout as they arrive.
///
/// A cancelled stream is not an error; the summary records it instead.
pub async fn print_stream(mut stream: TokenStream, mut spinner: Spinner) -> Result<StreamSummary> {
    let start = Instant::now();
    let mut summary = StreamSummary::default();

    while let Some(item) = stream.next().await {
        spinner.stop();
        match item {
            Ok(token) => {
                output::token(&token.text)?;
                summary.tokens += 1;
                summary.chars += token.text.chars().count();
            }
            Err(GateError::StreamCancelled { partial_text }) => {
                log::debug!("Stream cancelled after {} chars", partial_text.len());
                summary.cancelled = true;
                break;
            }
            Err(e) => {
                println!();
                return Err(e.into());
            }
        }
    }
    spinner.stop();
    if summary.tokens > 0 {
        println!();
    }

    log::debug!(
        "Printed {} tokens ({} chars) in {:?}",
        summary.tokens,
        summary.chars,
        start.elapsed()
    );
    Ok(summary)
}
