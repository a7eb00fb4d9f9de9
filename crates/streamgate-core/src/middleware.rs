use crate::adapter::StreamAdapter;
use crate::config::{GateConfig, StreamConfig};
use crate::error::GateError;
use crate::ratelimit::{FailPolicy, FixedWindowRateLimiter, RateLimitDecision};
use crate::types::{NormalizedToken, TokenStream};
use futures::Stream;
use metrics::{counter, histogram};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Streaming metrics collector
#[derive(Debug, Clone)]
pub struct StreamingMetrics {
    pub start_time: Instant,
    pub first_token_latency: Option<Duration>,
    pub total_bytes: usize,
    pub total_tokens: usize,
    pub provider_name: String,
}

impl StreamingMetrics {
    pub fn new(provider_name: String) -> Self {
        Self {
            start_time: Instant::now(),
            first_token_latency: None,
            total_bytes: 0,
            total_tokens: 0,
            provider_name,
        }
    }

    pub fn record_token(&mut self, token: &str) {
        if self.first_token_latency.is_none() {
            let latency = self.start_time.elapsed();
            self.first_token_latency = Some(latency);

            histogram!(
                "streamgate_stream_first_token_latency_ms",
                "provider" => self.provider_name.clone()
            )
            .record(latency.as_millis() as f64);

            log::debug!(
                "First token received after {:?} for provider {}",
                latency,
                self.provider_name
            );
        }

        self.total_bytes += token.len();
        self.total_tokens += 1;
    }

    pub fn record_error(&self) {
        counter!(
            "streamgate_stream_errors_total",
            "provider" => self.provider_name.clone()
        )
        .increment(1);
    }

    pub fn finalize(&self) {
        let total_duration = self.start_time.elapsed();

        if total_duration.as_secs_f64() > 0.0 {
            let tokens_per_second = self.total_tokens as f64 / total_duration.as_secs_f64();
            histogram!(
                "streamgate_stream_tokens_per_second",
                "provider" => self.provider_name.clone()
            )
            .record(tokens_per_second);

            log::debug!(
                "Stream completed: {} bytes, {} tokens in {:?} ({:.2} tokens/s) for provider {}",
                self.total_bytes,
                self.total_tokens,
                total_duration,
                tokens_per_second,
                self.provider_name
            );
        }

        counter!(
            "streamgate_stream_completions_total",
            "provider" => self.provider_name.clone()
        )
        .increment(1);
    }
}

/// Wrapper stream that adds metrics tracking
pub struct MetricsStream<S> {
    inner: S,
    metrics: StreamingMetrics,
    failed: bool,
}

impl<S> MetricsStream<S> {
    pub fn new(inner: S, provider_name: String) -> Self {
        Self {
            inner,
            metrics: StreamingMetrics::new(provider_name),
            failed: false,
        }
    }

    pub fn metrics(&self) -> &StreamingMetrics {
        &self.metrics
    }
}

impl<S> Stream for MetricsStream<S>
where
    S: Stream<Item = Result<NormalizedToken, GateError>> + Unpin,
{
    type Item = Result<NormalizedToken, GateError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(token))) => {
                self.metrics.record_token(&token.text);
                Poll::Ready(Some(Ok(token)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.failed = true;
                self.metrics.record_error();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if !self.failed {
                    self.metrics.finalize();
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Result of handing a request to the [`Relay`]
pub enum RelayOutcome {
    /// The rate limiter said no; answer with 429
    Rejected(RateLimitDecision),
    /// The provider call went through; relay `stream` as the response body
    Streaming {
        stream: TokenStream,
        decision: Option<RateLimitDecision>,
    },
}

impl RelayOutcome {
    /// HTTP status to open the response with
    pub fn status_code(&self) -> u16 {
        match self {
            RelayOutcome::Rejected(decision) => decision.status_code(),
            RelayOutcome::Streaming { .. } => 200,
        }
    }

    pub fn decision(&self) -> Option<&RateLimitDecision> {
        match self {
            RelayOutcome::Rejected(decision) => Some(decision),
            RelayOutcome::Streaming { decision, .. } => decision.as_ref(),
        }
    }
}

impl std::fmt::Debug for RelayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayOutcome::Rejected(decision) => f.debug_tuple("Rejected").field(decision).finish(),
            RelayOutcome::Streaming { decision, .. } => f
                .debug_struct("Streaming")
                .field("decision", decision)
                .finish_non_exhaustive(),
        }
    }
}

/// Service builder for the request path: rate limit, then provider, then adapter
#[derive(Default)]
pub struct RelayBuilder {
    stream_config: StreamConfig,
    limiter: Option<FixedWindowRateLimiter>,
    fail_policy: FailPolicy,
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &GateConfig) -> Self {
        Self {
            stream_config: config.stream.clone(),
            limiter: None,
            fail_policy: config.fail_policy,
        }
    }

    pub fn rate_limiter(mut self, limiter: FixedWindowRateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn fail_policy(mut self, policy: FailPolicy) -> Self {
        self.fail_policy = policy;
        self
    }

    pub fn logging(mut self, enabled: bool) -> Self {
        self.stream_config.enable_logging = enabled;
        self
    }

    pub fn metrics(mut self) -> Self {
        self.stream_config.enable_metrics = true;
        self
    }

    pub fn build(self) -> Relay {
        Relay {
            stream_config: self.stream_config,
            limiter: self.limiter,
            fail_policy: self.fail_policy,
        }
    }
}

/// The request path in front of a provider call
pub struct Relay {
    stream_config: StreamConfig,
    limiter: Option<FixedWindowRateLimiter>,
    fail_policy: FailPolicy,
}

impl Relay {
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    /// Check `key` against the limiter, if one is configured.
    ///
    /// Store failures are resolved with the configured fail policy.
    pub async fn admit(&self, key: &str) -> Option<RateLimitDecision> {
        let limiter = self.limiter.as_ref()?;
        let decision = limiter.check_with_policy(key, self.fail_policy).await;

        if self.stream_config.enable_metrics {
            let outcome = if decision.allowed { "allowed" } else { "rejected" };
            counter!("streamgate_ratelimit_decisions_total", "outcome" => outcome).increment(1);
        }
        Some(decision)
    }

    /// Admit `key`, then call the provider and adapt its stream.
    ///
    /// `upstream` only runs when the request was admitted.
    pub async fn handle<F, Fut>(&self, key: &str, upstream: F) -> Result<RelayOutcome, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StreamAdapter, GateError>>,
    {
        let decision = self.admit(key).await;
        if let Some(decision) = decision.as_ref().filter(|d| !d.allowed) {
            if self.stream_config.enable_logging {
                log::info!(
                    "Rejected request for {key}: limit of {} reached, retry in {:?}",
                    decision.limit,
                    decision.reset_after
                );
            }
            return Ok(RelayOutcome::Rejected(decision.clone()));
        }

        let start = Instant::now();
        let mut adapter = match upstream().await {
            Ok(adapter) => adapter,
            Err(e) => {
                if self.stream_config.enable_logging {
                    log::error!("Provider call failed after {:?}: {e}", start.elapsed());
                }
                return Err(e);
            }
        };

        if self.stream_config.enable_logging {
            log::info!(
                "Relaying {} stream for {key} (connected in {:?})",
                adapter.label(),
                start.elapsed()
            );
        }

        let label = adapter.label().to_string();
        let stream = adapter.stream()?;
        let stream: TokenStream = if self.stream_config.enable_metrics {
            Box::pin(MetricsStream::new(stream, label))
        } else {
            stream
        };

        Ok(RelayOutcome::Streaming { stream, decision })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.stream_config
    }
}
