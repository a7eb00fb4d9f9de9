use anyhow::{Context, Result};
use clap::Args;
use streamgate_core::{
    FixedWindowRateLimiter, GateConfig, GateError, ProviderKind, Relay, RelayBuilder, RelayOutcome,
    StreamAdapter, StreamCallbacks,
};
use tokio_util::sync::CancellationToken;

use crate::args::parse_header;
use crate::commands::{build_limiter, cancel_on_ctrl_c, print_stream};
use crate::config::CliConfig;
use crate::constants::DEFAULT_CLIENT_KEY;
use crate::output::{self, OutputLevel};
use crate::spinner::Spinner;

#[derive(Args)]
pub struct RelayArgs {
    /// Provider endpoint to POST to
    pub url: String,

    /// Provider the endpoint belongs to (openai, anthropic, google, cohere, text)
    #[arg(short, long, default_value = "openai")]
    pub provider: ProviderKind,

    /// JSON request body, or @path to read it from a file
    #[arg(short, long)]
    pub body: Option<String>,

    /// Extra request header, as NAME=VALUE or "NAME: VALUE" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Client key the rate limit is counted against
    #[arg(short, long, default_value = DEFAULT_CLIENT_KEY)]
    pub key: String,
}

impl RelayArgs {
    pub async fn run(&self, output_level: OutputLevel, cli_config: &CliConfig) -> Result<()> {
        let body = self.load_body().await?;
        let config = &cli_config.config;

        let relay = configured_relay(config, build_limiter(config).await?);

        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(&cancel);

        let spinner = Spinner::start(&format!(
            "Waiting for {}",
            output::format_provider(self.provider.name())
        ));
        let outcome = relay
            .handle(&self.key, || async move {
                let mut request = reqwest::Client::new()
                    .post(&self.url)
                    .header("content-type", "application/json");
                for (name, value) in &self.headers {
                    request = request.header(name, value);
                }
                if let Some(body) = body {
                    request = request.body(body);
                }

                let response = request.send().await?;
                let adapter = StreamAdapter::from_response(response, self.provider).await?;
                Ok::<_, GateError>(
                    adapter
                        .with_callbacks(StreamCallbacks::new().on_start(|| {
                            log::debug!("Provider started streaming");
                        }))
                        .with_cancellation(cancel),
                )
            })
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                drop(spinner);
                return Err(e).context("Provider request failed");
            }
        };

        match outcome {
            RelayOutcome::Rejected(decision) => {
                drop(spinner);
                output::error(&format!(
                    "Rate limit exceeded for '{}' ({})",
                    self.key,
                    output::format_decision(&decision)
                ));
                for (name, value) in decision.headers() {
                    output::note(&format!("{name}: {value}"), output_level);
                }
                output::hint(&format!(
                    "Retry later, or raise rate_limit.limit in {}",
                    cli_config.config_path.display()
                ));
                anyhow::bail!("request rejected with status {}", decision.status_code());
            }
            RelayOutcome::Streaming { stream, decision } => {
                if let Some(decision) = &decision {
                    log::debug!("Admitted: {}", output::format_decision(decision));
                }
                let summary = print_stream(stream, spinner).await?;
                if summary.cancelled {
                    output::warning("Interrupted", output_level);
                } else if output_level == OutputLevel::Verbose {
                    output::success(
                        &format!("Relayed {} tokens ({} chars)", summary.tokens, summary.chars),
                        output_level,
                    );
                }
            }
        }
        Ok(())
    }

    async fn load_body(&self) -> Result<Option<String>> {
        let Some(body) = &self.body else {
            return Ok(None);
        };
        let body = match body.strip_prefix('@') {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read request body from {path}"))?,
            None => body.clone(),
        };

        serde_json::from_str::<serde_json::Value>(&body).context("Request body is not valid JSON")?;
        Ok(Some(body))
    }
}

/// Relay honoring every configured stream and fail-policy option
fn configured_relay(config: &GateConfig, limiter: FixedWindowRateLimiter) -> Relay {
    RelayBuilder::with_config(config).rate_limiter(limiter).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_core::MemoryStore;

    fn args(body: Option<&str>) -> RelayArgs {
        RelayArgs {
            url: "http://localhost:1/v1".to_string(),
            provider: ProviderKind::OpenAI,
            body: body.map(str::to_string),
            headers: Vec::new(),
            key: DEFAULT_CLIENT_KEY.to_string(),
        }
    }

    #[tokio::test]
    async fn test_inline_body_must_be_json() {
        assert_eq!(
            args(Some(r#"{"stream":true}"#)).load_body().await.unwrap(),
            Some(r#"{"stream":true}"#.to_string())
        );
        assert!(args(Some("not json")).load_body().await.is_err());
        assert_eq!(args(None).load_body().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_body_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(&path, r#"{"model":"m"}"#).unwrap();

        let arg = format!("@{}", path.display());
        let body = args(Some(&arg)).load_body().await.unwrap();
        assert_eq!(body.as_deref(), Some(r#"{"model":"m"}"#));
    }

    #[test]
    fn test_relay_follows_config() {
        let mut config = GateConfig::default();
        config.stream.enable_metrics = true;
        config.stream.enable_logging = false;

        let limiter = FixedWindowRateLimiter::from_config(MemoryStore::new(), &config.rate_limit).unwrap();
        let relay = configured_relay(&config, limiter);
        assert!(relay.config().enable_metrics);
        assert!(!relay.config().enable_logging);
    }
}
