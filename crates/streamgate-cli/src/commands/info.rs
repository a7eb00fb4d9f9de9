use anyhow::Result;
use clap::Args;
use streamgate_core::ProviderKind;
use streamgate_core::config::{ENV_FAIL_POLICY, ENV_RATE_LIMIT, ENV_REDIS_URL, ENV_WINDOW_SECS};
use strum::IntoEnumIterator;

use crate::config::CliConfig;
use crate::output::{self, OutputLevel};

#[derive(Args)]
pub struct InfoArgs {
    // Info command has no arguments
}

impl InfoArgs {
    pub async fn run(&self, output_level: OutputLevel, cli_config: &CliConfig) -> Result<()> {
        output::note(
            &format!("config file: {}", cli_config.config_path.display()),
            output_level,
        );

        output::heading("\nResolved config:", output_level);
        // The resolved config is the command's output
        print!("{}", toml::to_string_pretty(&cli_config.config)?);

        output::heading("\nEnv Vars:", output_level);
        for name in [ENV_RATE_LIMIT, ENV_WINDOW_SECS, ENV_FAIL_POLICY, ENV_REDIS_URL] {
            output::note(&format!("{name} = {}", env_var_status(name)), output_level);
        }

        output::heading("\nProviders:", output_level);
        for provider in ProviderKind::iter() {
            output::note(
                &format!(
                    "{} ({})",
                    output::format_provider(provider.name()),
                    provider.wire_format()
                ),
                output_level,
            );
        }

        output::heading("\nVersion info:", output_level);
        output::note(
            &format!("version: {}", env!("CARGO_PKG_VERSION")),
            output_level,
        );
        output::note(
            &format!(
                "redis store: {}",
                if cfg!(feature = "redis") {
                    "enabled"
                } else {
                    "disabled"
                }
            ),
            output_level,
        );

        Ok(())
    }
}

/// Helper function to check environment variable status
fn env_var_status(var_name: &str) -> &'static str {
    if std::env::var(var_name).is_ok() {
        "Present"
    } else {
        "None"
    }
}
