use anyhow::Result;
use clap::Args;
use streamgate_core::GateConfig;

use crate::commands::build_limiter;
use crate::config::CliConfig;
use crate::output::{self, OutputLevel};

#[derive(Args)]
pub struct LimitArgs {
    /// Client key to count requests against
    pub key: String,

    /// Number of checks to issue
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// Override the configured requests per window
    #[arg(long)]
    pub limit: Option<u64>,

    /// Override the configured window length, in seconds
    #[arg(long)]
    pub window: Option<u64>,

    /// Print headers a server would send with each decision
    #[arg(long)]
    pub headers: bool,
}

impl LimitArgs {
    pub async fn run(&self, output_level: OutputLevel, cli_config: &CliConfig) -> Result<()> {
        let config = self.effective_config(&cli_config.config)?;
        let limiter = build_limiter(&config).await?;

        output::heading(
            &format!(
                "{} requests per {}s for '{}'",
                limiter.limit(),
                limiter.window().as_secs(),
                self.key
            ),
            output_level,
        );

        let mut admitted = 0;
        for attempt in 1..=self.count {
            let decision = limiter.check_with_policy(&self.key, config.fail_policy).await;
            if decision.allowed {
                admitted += 1;
            }

            // Decisions are the command's output, so they go to stdout
            println!("#{attempt}: {}", output::format_decision(&decision));
            if self.headers {
                for (name, value) in decision.headers() {
                    println!("    {name}: {value}");
                }
            }
        }

        output::note(
            &format!("{admitted} of {} checks admitted", self.count),
            output_level,
        );
        Ok(())
    }

    fn effective_config(&self, config: &GateConfig) -> Result<GateConfig> {
        let mut config = config.clone();
        if let Some(limit) = self.limit {
            config.rate_limit.limit = limit;
        }
        if let Some(window) = self.window {
            config.rate_limit.window_secs = window;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(limit: Option<u64>, window: Option<u64>) -> LimitArgs {
        LimitArgs {
            key: "k".to_string(),
            count: 1,
            limit,
            window,
            headers: false,
        }
    }

    #[test]
    fn test_overrides_replace_configured_values() {
        let config = args(Some(2), Some(10))
            .effective_config(&GateConfig::default())
            .unwrap();
        assert_eq!(config.rate_limit.limit, 2);
        assert_eq!(config.rate_limit.window_secs, 10);

        let config = args(None, None)
            .effective_config(&GateConfig::default())
            .unwrap();
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn test_zero_override_is_rejected() {
        assert!(args(Some(0), None).effective_config(&GateConfig::default()).is_err());
        assert!(args(None, Some(0)).effective_config(&GateConfig::default()).is_err());
    }
}
