//! Runtime configuration
//!
//! Layered like the rest of the stack: built-in defaults, then an optional
//! TOML file (`REWIND_CONFIG_PATH`, else `rewind.toml` in the working
//! directory), then `REWIND_*` environment variables.

use crate::runtime::Strategy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_PATH_ENV: &str = "REWIND_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "rewind.toml";
pub const ENV_PREFIX: &str = "REWIND";

/// Which elapsed-time estimator drives time-based yielding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    Exact,
    #[default]
    Velocity,
    Countdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capture strategy
    pub strategy: Strategy,

    pub estimator: EstimatorKind,

    /// Yield once the estimated turn length reaches this many milliseconds
    pub yield_interval_ms: u64,

    /// Logical frame budget per turn; unlimited when absent
    pub stack_size: Option<usize>,

    /// Countdown estimator: queries per reported interval
    pub time_per_elapsed: u64,

    /// Velocity estimator: queries between clock samples
    pub resample_interval: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Lazy,
            estimator: EstimatorKind::Velocity,
            yield_interval_ms: 100,
            stack_size: None,
            time_per_elapsed: 1,
            resample_interval: 100,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Some(Path::new(&path)))
    }

    /// Load configuration, reading `path` if it exists
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        Self::load_layered(path, None)
    }

    /// Layer defaults, `path` and the environment. `env` replaces the
    /// process environment when given.
    fn load_layered(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self> {
        let defaults = config::Config::try_from(&RuntimeConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true)
                .source(env),
        );

        let config: RuntimeConfig = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, filling unset keys with defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(source).context("Invalid runtime configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.yield_interval_ms == 0 {
            bail!("yield_interval_ms must be positive");
        }
        if self.stack_size == Some(0) {
            bail!("stack_size must be positive when set");
        }
        if self.time_per_elapsed == 0 {
            bail!("time_per_elapsed must be positive");
        }
        if self.resample_interval == 0 {
            bail!("resample_interval must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            strategy = "eager"
            stack_size = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy, Strategy::Eager);
        assert_eq!(config.stack_size, Some(64));
        assert_eq!(config.yield_interval_ms, 100);
        assert_eq!(config.estimator, EstimatorKind::Velocity);
    }

    #[test]
    fn test_from_toml_rejects_zero_interval() {
        let err = RuntimeConfig::from_toml_str("yield_interval_ms = 0").unwrap_err();
        assert!(err.to_string().contains("yield_interval_ms"));
    }

    #[test]
    fn test_from_toml_rejects_unknown_strategy() {
        assert!(RuntimeConfig::from_toml_str(r#"strategy = "greedy""#).is_err());
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config =
            RuntimeConfig::load_from(Some(Path::new("/nonexistent/rewind-test.toml"))).unwrap();
        assert_eq!(config.strategy, Strategy::Lazy);
        assert_eq!(config.time_per_elapsed, 1);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let env: config::Map<String, String> = [
            ("REWIND_STACK_SIZE", "7"),
            ("REWIND_STRATEGY", "eager"),
            ("REWIND_YIELD_INTERVAL_MS", "25"),
            ("OTHER_STACK_SIZE", "99"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = RuntimeConfig::load_layered(None, Some(env)).unwrap();
        assert_eq!(config.stack_size, Some(7));
        assert_eq!(config.strategy, Strategy::Eager);
        assert_eq!(config.yield_interval_ms, 25);
    }

    #[test]
    fn test_environment_rejects_invalid_values() {
        let env: config::Map<String, String> =
            [("REWIND_STACK_SIZE".to_string(), "0".to_string())].into_iter().collect();
        assert!(RuntimeConfig::load_layered(None, Some(env)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("rewind-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rewind.toml");
        std::fs::write(&path, "estimator = \"countdown\"\ntime_per_elapsed = 5\n").unwrap();

        let config = RuntimeConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.estimator, EstimatorKind::Countdown);
        assert_eq!(config.time_per_elapsed, 5);

        std::fs::remove_dir_all(&dir).ok();
    }
}
