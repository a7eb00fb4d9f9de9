//! # streamgate-core - streaming relay primitives for LLM providers
//!
//! Building blocks for services that sit between clients and LLM provider
//! APIs: a provider-agnostic stream adapter and a fixed-window rate limiter
//! backed by a shared store.
//!
//! ## Features
//!
//! - **Stream adapter** - provider chunks in, normalized text tokens out
//! - **Lifecycle callbacks** - start, per-token, completion and final hooks
//! - **Backpressure** - the provider is only read as fast as the consumer pulls
//! - **Cancellation** - stop a stream early and release the provider connection
//! - **Rate limiting** - atomic fixed windows in memory or in Redis
//! - **Observability** - `log` records and `metrics` counters throughout
//!
//! ## Quick Start
//!
//! ### Adapting a provider stream
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use streamgate_core::{ProviderKind, StreamAdapter, StreamCallbacks};
//!
//! # async fn run(response: reqwest::Response) -> Result<(), streamgate_core::GateError> {
//! let mut adapter = StreamAdapter::from_response(response, ProviderKind::OpenAI)
//!     .await?
//!     .with_callbacks(
//!         StreamCallbacks::new()
//!             .on_token(|token| log::trace!("token: {token}"))
//!             .on_final(|text| println!("\n{} chars", text.len())),
//!     );
//!
//! let mut tokens = adapter.stream()?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Rate limiting
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use streamgate_core::{FixedWindowRateLimiter, MemoryStore};
//!
//! # async fn run() -> Result<(), streamgate_core::GateError> {
//! let limiter = FixedWindowRateLimiter::new(MemoryStore::new(), 5, Duration::from_secs(30))?;
//!
//! let decision = limiter.check("203.0.113.7").await?;
//! if !decision.allowed {
//!     println!("429, retry after {:?}", decision.reset_after);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Both together
//!
//! [`Relay`] runs the limiter first and only calls the provider for admitted
//! requests:
//!
//! ```rust,no_run
//! use streamgate_core::{
//!     FixedWindowRateLimiter, GateConfig, MemoryStore, ProviderKind, Relay, RelayOutcome,
//!     StreamAdapter,
//! };
//!
//! # async fn run(client: reqwest::Client) -> Result<(), streamgate_core::GateError> {
//! let config = GateConfig::from_env()?;
//! let limiter = FixedWindowRateLimiter::from_config(MemoryStore::new(), &config.rate_limit)?;
//! let relay = Relay::builder().rate_limiter(limiter).metrics().build();
//!
//! let outcome = relay
//!     .handle("203.0.113.7", || async {
//!         let response = client.post("https://api.openai.com/v1/chat/completions").send().await?;
//!         let adapter = StreamAdapter::from_response(response, ProviderKind::OpenAI).await?;
//!         Ok::<_, streamgate_core::GateError>(adapter)
//!     })
//!     .await?;
//!
//! match outcome {
//!     RelayOutcome::Rejected(decision) => println!("rejected: {:?}", decision.headers()),
//!     RelayOutcome::Streaming { stream, .. } => { /* write `stream` to the client */ }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, GateError>`](GateError). Stream failures
//! carry the text produced before the failure:
//!
//! ```rust,no_run
//! use streamgate_core::GateError;
//!
//! # fn report(err: GateError) {
//! match err {
//!     GateError::StreamTransport { message, partial_text, .. } => {
//!         println!("provider failed after {} chars: {message}", partial_text.len())
//!     }
//!     GateError::StreamAlreadyConsumed => println!("adapter output taken twice"),
//!     e => println!("Other error: {e}"),
//! }
//! # }
//! ```

pub mod adapter;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod middleware;
pub mod providers;
pub mod ratelimit;
pub mod transport;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

pub use adapter::StreamAdapter;
pub use callbacks::StreamCallbacks;
pub use config::{GateConfig, RateLimit, StreamConfig};
pub use error::GateError;
pub use middleware::{MetricsStream, Relay, RelayBuilder, RelayOutcome, StreamingMetrics};
pub use providers::{ChunkParser, ProviderKind, TextParser, delta_parser};
#[cfg(feature = "redis")]
pub use ratelimit::RedisStore;
pub use ratelimit::{
    FailPolicy, FixedWindowRateLimiter, MemoryStore, RateLimitDecision, WindowRecord, WindowStore,
};
pub use transport::{ChunkStreamTransport, ProviderTransport, WireFormat};
pub use types::{ChunkKind, NormalizedToken, RawChunk, StreamChunk, StreamResult, TokenStream};
pub use utils::ndjson::ndjson_lines;
pub use utils::sse::{SseEvent, sse_events};

// Re-export test utilities for integration tests
#[cfg(test)]
pub use utils::test_helpers;
