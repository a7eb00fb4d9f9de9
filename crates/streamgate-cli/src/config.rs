use anyhow::{Context, Result};
use etcetera::BaseStrategy;
use std::path::{Path, PathBuf};
use streamgate_core::GateConfig;

use crate::constants::{BINARY_NAME, CONFIG_FILE_NAME};

/// Resolved configuration plus where it came from
pub struct CliConfig {
    pub config_path: PathBuf,
    pub config: GateConfig,
}

impl CliConfig {
    /// Load `config.toml` from the platform config directory, or from
    /// `override_path` when given, then apply environment overrides.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let config_path = match override_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        let config = load_or_create(&config_path)?
            .apply_env()
            .context("Invalid environment override")?;

        Ok(Self {
            config_path,
            config,
        })
    }
}

fn default_config_path() -> Result<PathBuf> {
    let strategy = etcetera::choose_base_strategy()
        .context("Could not determine the configuration directory")?;
    Ok(strategy.config_dir().join(BINARY_NAME).join(CONFIG_FILE_NAME))
}

fn load_or_create(config_path: &Path) -> Result<GateConfig> {
    if !config_path.exists() {
        // Create default config
        let default_config = GateConfig::default();
        default_config
            .save(config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        log::debug!("Wrote default configuration to {}", config_path.display());
        return Ok(default_config);
    }

    GateConfig::load(config_path).with_context(|| format!("Failed to load {}", config_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn test_existing_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[rate_limit]\nlimit = 12\nwindow_secs = 60\n").unwrap();

        let config = load_or_create(&path).unwrap();
        assert_eq!(config.rate_limit.limit, 12);
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[rate_limit]\nlimit = 0\n").unwrap();

        assert!(load_or_create(&path).is_err());
    }
}
