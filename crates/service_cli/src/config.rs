//! CLI configuration management
//!
//! Handles loading configuration from TOML files, environment variables and
//! command-line flags.
//!
//! Priority (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Config file
//! 4. Default values

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use solver_core::KrylovOptions;
use solver_newton::NewtonOptions;
use thiserror::Error;

/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "ITSOLVE_LOG_LEVEL";
/// Environment variable overriding the output format.
pub const ENV_FORMAT: &str = "ITSOLVE_FORMAT";
/// Environment variable overriding the Krylov method.
pub const ENV_KSP_TYPE: &str = "ITSOLVE_KSP_TYPE";
/// Environment variable overriding the line search.
pub const ENV_LINE_SEARCH: &str = "ITSOLVE_LINE_SEARCH";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid output format: {0}. Must be one of: table, json")]
    InvalidFormat(String),

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error("Invalid solver options: {0}")]
    InvalidOptions(String),
}

/// Log levels accepted by `--log-level` and `ITSOLVE_LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

const LOG_LEVELS: [(&str, LogLevel); 5] = [
    ("trace", LogLevel::Trace),
    ("debug", LogLevel::Debug),
    ("info", LogLevel::Info),
    ("warn", LogLevel::Warn),
    ("error", LogLevel::Error),
];

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LOG_LEVELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|&(_, level)| level)
            .ok_or_else(|| ConfigError::InvalidLogLevel(s.to_string()))
    }
}

impl LogLevel {
    /// Directive handed to `EnvFilter` when `RUST_LOG` is unset
    pub fn as_filter_str(&self) -> &'static str {
        LOG_LEVELS
            .iter()
            .find(|(_, level)| level == self)
            .map_or("warn", |&(name, _)| name)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

/// Report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
        })
    }
}

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Log level
    #[serde(deserialize_with = "deserialize_parsed")]
    pub log_level: LogLevel,
    /// Report format
    #[serde(deserialize_with = "deserialize_parsed")]
    pub format: OutputFormat,
    /// `[linear]` table: Krylov solver options
    pub linear: KrylovOptions,
    /// `[newton]` table: Newton solver options (with a nested `[newton.linear]`)
    pub newton: NewtonOptions,
}

/// Read a string field through the type's `FromStr`, keeping its error text.
fn deserialize_parsed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr<Err = ConfigError>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

impl CliConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: CliConfig = toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from environment-style variables
    ///
    /// `lookup` returns the value of a variable if it is set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = LogLevel::from_str(&level)?;
        }
        if let Some(format) = lookup(ENV_FORMAT) {
            self.format = OutputFormat::from_str(&format)?;
        }
        if let Some(ksp_type) = lookup(ENV_KSP_TYPE) {
            self.linear.ksp_type = ksp_type.clone();
            self.newton.linear.ksp_type = ksp_type;
        }
        if let Some(line_search) = lookup(ENV_LINE_SEARCH) {
            self.newton.line_search = line_search
                .parse()
                .map_err(|e: solver_core::SolverError| ConfigError::InvalidOptions(e.to_string()))?;
        }
        Ok(())
    }

    /// Validate the solver option tables
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.linear
            .validate()
            .map_err(|e| ConfigError::InvalidOptions(format!("[linear] {}", e)))?;
        self.newton
            .validate()
            .map_err(|e| ConfigError::InvalidOptions(format!("[newton] {}", e)))?;
        Ok(())
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(log_level) = &cli.log_level {
            self.log_level = LogLevel::from_str(log_level)?;
        }
        if let Some(format) = &cli.format {
            self.format = OutputFormat::from_str(format)?;
        }
        Ok(())
    }
}

/// Global CLI arguments relevant to configuration
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Log level override
    pub log_level: Option<String>,
    /// Output format override
    pub format: Option<String>,
}

/// Build configuration from all sources
pub fn build_config(cli: &CliArgs) -> Result<CliConfig, ConfigError> {
    let mut config = match &cli.config_file {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.merge_with_cli(cli)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver_newton::LineSearchKind;
    use std::collections::HashMap;

    fn env(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key: &str| vars.get(key).map(|v| v.to_string())
    }

    // ================================================================
    // Defaults and TOML
    // ================================================================

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.log_level.as_filter_str(), "warn");
        assert_eq!(config.format, OutputFormat::Table);
        assert_eq!(config.linear.ksp_type, "tfqmr");
        assert_eq!(config.newton.line_search, LineSearchKind::Cubic);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            log_level = "DEBUG"
            format = "json"

            [linear]
            ksp_type = "richardson"
            richardson_scale = 0.5

            [newton]
            line_search = "quadratic"
            max_iterations = 20

            [newton.linear]
            rtol = 1e-10
        "#;

        let config = CliConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.linear.ksp_type, "richardson");
        assert_eq!(config.linear.richardson_scale, 0.5);
        assert_eq!(config.newton.line_search, LineSearchKind::Quadratic);
        assert_eq!(config.newton.max_iterations, 20);
        assert_eq!(config.newton.linear.rtol, 1e-10);
        assert_eq!(config.newton.linear.ksp_type, "tfqmr");
    }

    #[test]
    fn test_invalid_toml_values() {
        match CliConfig::from_toml("log_level = \"loud\"") {
            Err(ConfigError::FileError(msg)) => assert!(msg.contains("loud"), "{}", msg),
            other => panic!("Expected FileError, got {:?}", other),
        }
        match CliConfig::from_toml("format = \"csv\"") {
            Err(ConfigError::FileError(msg)) => assert!(msg.contains("csv"), "{}", msg),
            other => panic!("Expected FileError, got {:?}", other),
        }
        match CliConfig::from_toml("[linear]\nrtol = 1.5") {
            Err(ConfigError::InvalidOptions(msg)) => assert!(msg.starts_with("[linear]"), "{}", msg),
            other => panic!("Expected InvalidOptions, got {:?}", other),
        }
    }

    // ================================================================
    // ITSOLVE_* environment overrides
    // ================================================================

    #[test]
    fn test_env_overrides() {
        let mut config = CliConfig::default();
        config
            .apply_env(env(&[
                (ENV_LOG_LEVEL, " Info "),
                (ENV_FORMAT, "JSON"),
                (ENV_KSP_TYPE, "qcg"),
                (ENV_LINE_SEARCH, "basicnonorms"),
            ]))
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.linear.ksp_type, "qcg");
        assert_eq!(config.newton.linear.ksp_type, "qcg");
        assert_eq!(config.newton.line_search, LineSearchKind::BasicNoNorms);
    }

    #[test]
    fn test_env_unset_keeps_file_values() {
        let mut config = CliConfig::from_toml("format = \"json\"\n[linear]\nksp_type = \"richardson\"").unwrap();
        config.apply_env(env(&[])).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.linear.ksp_type, "richardson");
        assert_eq!(config.newton.linear.ksp_type, "tfqmr");
    }

    #[test]
    fn test_env_invalid_values() {
        let mut config = CliConfig::default();
        match config.apply_env(env(&[(ENV_LOG_LEVEL, "verbose")])) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel, got {:?}", other),
        }
        match config.apply_env(env(&[(ENV_FORMAT, "xml")])) {
            Err(ConfigError::InvalidFormat(format)) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidFormat, got {:?}", other),
        }
        assert!(matches!(
            config.apply_env(env(&[(ENV_LINE_SEARCH, "wolfe")])),
            Err(ConfigError::InvalidOptions(_))
        ));
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.format, OutputFormat::Table);
    }

    // ================================================================
    // Source priority
    // ================================================================

    #[test]
    fn test_file_env_cli_priority() {
        let mut config = CliConfig::from_toml("log_level = \"error\"\nformat = \"table\"").unwrap();
        config
            .apply_env(env(&[(ENV_LOG_LEVEL, "debug"), (ENV_FORMAT, "json")]))
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);

        let cli = CliArgs {
            log_level: Some("trace".to_string()),
            ..Default::default()
        };
        config.merge_with_cli(&cli).unwrap();
        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.format, OutputFormat::Json);

        let bad = CliArgs {
            format: Some("xml".to_string()),
            ..Default::default()
        };
        assert!(config.merge_with_cli(&bad).is_err());
    }

    #[test]
    fn test_missing_file() {
        let cli = CliArgs {
            config_file: Some(PathBuf::from("/nonexistent/itsolve.toml")),
            ..Default::default()
        };
        assert!(matches!(build_config(&cli), Err(ConfigError::FileError(_))));
    }
}
