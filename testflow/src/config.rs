//! Engine configuration.
//!
//! Settings come from defaults, an optional JSON file and `TESTFLOW_*`
//! environment variables, in that order of increasing precedence.

use crate::containers::DEFAULT_MAX_ITERATIONS;
use crate::endpoints::EndpointConfig;
use crate::errors::TestflowError;
use crate::variables::DEFAULT_FUNCTION_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Environment variable overriding the receive timeout.
pub const RECEIVE_TIMEOUT_ENV: &str = "TESTFLOW_RECEIVE_TIMEOUT_MS";
/// Environment variable overriding the polling interval.
pub const POLLING_INTERVAL_ENV: &str = "TESTFLOW_POLLING_INTERVAL_MS";
/// Environment variable overriding the late reply retention.
pub const RETENTION_ENV: &str = "TESTFLOW_RETENTION_MS";
/// Environment variable overriding the function prefix.
pub const FUNCTION_PREFIX_ENV: &str = "TESTFLOW_FUNCTION_PREFIX";
/// Environment variable overriding the iteration guard.
pub const MAX_ITERATIONS_ENV: &str = "TESTFLOW_MAX_ITERATIONS";
/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "TESTFLOW_LOG_LEVEL";
/// Environment variable switching JSON log output.
pub const LOG_JSON_ENV: &str = "TESTFLOW_LOG_JSON";

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `testflow=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default receive timeout in milliseconds.
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    /// Interval between correlation lookups in milliseconds.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// How long timed-out keys wait for late replies, in milliseconds.
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    /// Prefix of the built-in function library.
    #[serde(default = "default_function_prefix")]
    pub function_prefix: String,

    /// Guard for condition loops.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_receive_timeout_ms() -> u64 {
    5000
}

fn default_polling_interval_ms() -> u64 {
    500
}

fn default_retention_ms() -> u64 {
    30_000
}

fn default_function_prefix() -> String {
    DEFAULT_FUNCTION_PREFIX.to_string()
}

fn default_max_iterations() -> u64 {
    DEFAULT_MAX_ITERATIONS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: default_receive_timeout_ms(),
            polling_interval_ms: default_polling_interval_ms(),
            retention_ms: default_retention_ms(),
            function_prefix: default_function_prefix(),
            max_iterations: default_max_iterations(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the receive timeout.
    #[must_use]
    pub fn with_receive_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.receive_timeout_ms = timeout_ms;
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn with_polling_interval_ms(mut self, interval_ms: u64) -> Self {
        self.polling_interval_ms = interval_ms;
        self
    }

    /// Sets the late reply retention.
    #[must_use]
    pub fn with_retention_ms(mut self, retention_ms: u64) -> Self {
        self.retention_ms = retention_ms;
        self
    }

    /// Sets the function prefix.
    #[must_use]
    pub fn with_function_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.function_prefix = prefix.into();
        self
    }

    /// Sets the iteration guard.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Loads a config from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Configuration` if it is
    /// not a valid config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TestflowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            TestflowError::Configuration(format!("invalid config file {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `TESTFLOW_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a variable holds an invalid value.
    pub fn apply_env(self) -> Result<Self, TestflowError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup`, keyed by environment
    /// variable name.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if an override holds an invalid value.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, TestflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = read(RECEIVE_TIMEOUT_ENV) {
            self.receive_timeout_ms = parse(RECEIVE_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = read(POLLING_INTERVAL_ENV) {
            self.polling_interval_ms = parse(POLLING_INTERVAL_ENV, &value)?;
        }
        if let Some(value) = read(RETENTION_ENV) {
            self.retention_ms = parse(RETENTION_ENV, &value)?;
        }
        if let Some(value) = read(FUNCTION_PREFIX_ENV) {
            self.function_prefix = value.trim().to_string();
        }
        if let Some(value) = read(MAX_ITERATIONS_ENV) {
            self.max_iterations = parse(MAX_ITERATIONS_ENV, &value)?;
        }
        if let Some(value) = read(LOG_LEVEL_ENV) {
            self.logging.level = value.trim().to_string();
        }
        if let Some(value) = read(LOG_JSON_ENV) {
            self.logging.json = parse(LOG_JSON_ENV, &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks the settings for consistency.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` describing the first invalid setting.
    pub fn validate(&self) -> Result<(), TestflowError> {
        if self.polling_interval_ms == 0 {
            return Err(TestflowError::Configuration(
                "polling_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.function_prefix.is_empty()
            || !self
                .function_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(TestflowError::Configuration(format!(
                "function_prefix '{}' must be a non-empty identifier",
                self.function_prefix
            )));
        }
        if self.max_iterations == 0 {
            return Err(TestflowError::Configuration(
                "max_iterations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the endpoint settings derived from this config.
    #[must_use]
    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig::new()
            .with_timeout_ms(self.receive_timeout_ms)
            .with_polling_interval_ms(self.polling_interval_ms)
            .with_retention_ms(self.retention_ms)
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, TestflowError> {
    value.trim().parse().map_err(|_| {
        TestflowError::Configuration(format!("{name} has invalid value '{value}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.receive_timeout_ms, 5000);
        assert_eq!(config.polling_interval_ms, 500);
        assert_eq!(config.retention_ms, 30_000);
        assert_eq!(config.function_prefix, "core");
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"receive_timeout_ms": 250, "logging": {{"json": true}}}}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.receive_timeout_ms, 250);
        assert_eq!(config.polling_interval_ms, 500);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_errors() {
        let missing = EngineConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(missing.kind(), "IoError");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let invalid = EngineConfig::from_file(file.path()).unwrap_err();
        assert_eq!(invalid.kind(), "ConfigurationError");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (RECEIVE_TIMEOUT_ENV, "100"),
            (FUNCTION_PREFIX_ENV, "fn"),
            (LOG_JSON_ENV, "true"),
            (RETENTION_ENV, " "),
        ]);

        let config = EngineConfig::default()
            .apply_overrides(|name| env.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.receive_timeout_ms, 100);
        assert_eq!(config.function_prefix, "fn");
        assert!(config.logging.json);
        assert_eq!(config.retention_ms, 30_000);
    }

    #[test]
    fn test_invalid_override() {
        let err = EngineConfig::default()
            .apply_overrides(|name| (name == POLLING_INTERVAL_ENV).then(|| "fast".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(POLLING_INTERVAL_ENV));
    }

    #[test]
    fn test_validate() {
        assert!(EngineConfig::default().with_polling_interval_ms(0).validate().is_err());
        assert!(EngineConfig::default().with_function_prefix("a:b").validate().is_err());
        assert!(EngineConfig::default().with_max_iterations(0).validate().is_err());
    }

    #[test]
    fn test_endpoint_config() {
        let endpoint = EngineConfig::default()
            .with_receive_timeout_ms(42)
            .endpoint_config();
        assert_eq!(endpoint.timeout_ms, 42);
        assert_eq!(endpoint.polling_interval_ms, 500);
    }
}
