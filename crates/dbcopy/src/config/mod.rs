//! Configuration loading and validation.

mod options;
mod types;
mod validation;

pub use options::*;
pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Endpoint by logical name.
    pub fn endpoint(&self, name: &str) -> Result<&EndpointConfig> {
        self.endpoints.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
            MigrateError::Config(format!(
                "Unknown endpoint '{}'. Configured endpoints: {}",
                name,
                known.join(", ")
            ))
        })
    }
}
