//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::{DashboardConfig, Environment, ENVIRONMENT_ENV_VAR};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
///
/// Always fatal: the dashboard refuses to start on a bad configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DashboardConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate a TOML document.
pub fn parse_config(content: &str) -> Result<DashboardConfig, ConfigError> {
    let mut config: DashboardConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Apply `CERTDASH_ENV` on top of the file's `environment`.
pub fn apply_env_overrides(config: &mut DashboardConfig) {
    if let Ok(raw) = std::env::var(ENVIRONMENT_ENV_VAR) {
        match Environment::parse(&raw) {
            Some(environment) => config.environment = environment,
            None => tracing::warn!(
                value = %raw,
                "Ignoring unrecognized {}", ENVIRONMENT_ENV_VAR
            ),
        }
    }
}
