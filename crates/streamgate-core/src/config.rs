use crate::error::GateError;
use crate::ratelimit::FailPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variables that override file configuration
pub const ENV_RATE_LIMIT: &str = "STREAMGATE_RATE_LIMIT";
pub const ENV_WINDOW_SECS: &str = "STREAMGATE_WINDOW_SECS";
pub const ENV_FAIL_POLICY: &str = "STREAMGATE_FAIL_POLICY";
pub const ENV_REDIS_URL: &str = "STREAMGATE_REDIS_URL";

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    /// Requests allowed per window
    pub limit: u64,
    pub window_secs: u64,
    /// Prepended to every key in the store
    pub key_prefix: Option<String>,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            limit: 5,
            window_secs: 30,
            key_prefix: Some("streamgate:".to_string()),
        }
    }
}

impl RateLimit {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Streaming behavior shared by every relayed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enable_logging: bool,
    pub enable_metrics: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            enable_metrics: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub fail_policy: FailPolicy,
    /// Shared store for the rate limiter; in-memory when unset
    pub redis_url: Option<String>,
    pub rate_limit: RateLimit,
    pub stream: StreamConfig,
}

impl GateConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, GateError> {
        let config: GateConfig = toml::from_str(content)
            .map_err(|e| GateError::configuration(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, GateError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), GateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GateError::configuration(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| GateError::serialization("Failed to encode configuration", e))?;
        std::fs::write(path, content).map_err(|e| {
            GateError::configuration(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, GateError> {
        Self::default().apply_env()
    }

    /// Override fields from the process environment
    pub fn apply_env(self) -> Result<Self, GateError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Override fields from `lookup`, which maps a variable name to its value
    pub fn apply_env_with(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GateError> {
        if let Some(limit) = lookup(ENV_RATE_LIMIT) {
            self.rate_limit.limit = parse_number(ENV_RATE_LIMIT, &limit)?;
        }
        if let Some(window) = lookup(ENV_WINDOW_SECS) {
            self.rate_limit.window_secs = parse_number(ENV_WINDOW_SECS, &window)?;
        }
        if let Some(policy) = lookup(ENV_FAIL_POLICY) {
            self.fail_policy = policy.parse().map_err(|_| {
                GateError::configuration(format!(
                    "{ENV_FAIL_POLICY} must be 'open' or 'closed', got '{policy}'"
                ))
            })?;
        }
        if let Some(url) = lookup(ENV_REDIS_URL) {
            self.redis_url = Some(url).filter(|url| !url.is_empty());
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), GateError> {
        if self.rate_limit.limit == 0 {
            return Err(GateError::configuration("rate_limit.limit must be positive"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(GateError::configuration(
                "rate_limit.window_secs must be positive",
            ));
        }
        if let Some(url) = &self.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(GateError::configuration(
                    "redis_url must start with redis:// or rediss://",
                ));
            }
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64, GateError> {
    value
        .trim()
        .parse()
        .map_err(|_| GateError::configuration(format!("{name} must be a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = GateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.window(), Duration::from_secs(30));
        assert_eq!(config.fail_policy, FailPolicy::Closed);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = GateConfig::from_toml_str(
            r#"
            fail_policy = "open"

            [rate_limit]
            limit = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.limit, 10);
        assert_eq!(config.rate_limit.window_secs, 30);
        assert_eq!(config.fail_policy, FailPolicy::Open);
        assert!(config.stream.enable_logging);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = GateConfig::from_toml_str("[rate_limit]\nlimit = 0").unwrap_err();
        assert!(matches!(err, GateError::Configuration { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_RATE_LIMIT, "100"),
            (ENV_WINDOW_SECS, " 60 "),
            (ENV_FAIL_POLICY, "OPEN"),
            (ENV_REDIS_URL, "redis://cache:6379/"),
        ]);
        let config = GateConfig::default()
            .apply_env_with(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.rate_limit.limit, 100);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.fail_policy, FailPolicy::Open);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379/"));
    }

    #[test]
    fn malformed_environment_is_a_configuration_error() {
        let result = GateConfig::default()
            .apply_env_with(|name| (name == ENV_RATE_LIMIT).then(|| "lots".to_string()));
        assert!(matches!(result, Err(GateError::Configuration { .. })));

        let result = GateConfig::default()
            .apply_env_with(|name| (name == ENV_REDIS_URL).then(|| "http://nope".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn save_and_load_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = GateConfig::default();
        config.rate_limit.limit = 42;
        config.stream.enable_metrics = true;
        config.save(&path).unwrap();

        assert_eq!(GateConfig::load(&path).unwrap(), config);
    }
}
