//! YAML configuration for a responsibility session.

use std::collections::BTreeSet;
use std::path::Path;

use responsibility_core::PropagationPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatrixConfig {
    pub roles: RolesConfig,
    pub propagation: PropagationPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RolesConfig {
    /// Project roles shown by default. `None` shows every role.
    pub active: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl MatrixConfig {
    /// Parse a YAML config file from a path
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or validated.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a YAML config from a string
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the YAML is malformed or fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: MatrixConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(active) = &self.roles.active {
            let mut seen = BTreeSet::new();
            for key in active {
                if key.trim().is_empty() {
                    let message = "Active role keys cannot be empty";
                    return Err(ConfigError::Validation(message.into()));
                }
                if !seen.insert(key.trim()) {
                    let message = format!("Active role key listed twice: {key}");
                    return Err(ConfigError::Validation(message));
                }
            }
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Validation("Log filter cannot be empty".into()));
        }
        Ok(())
    }
}
