//! Configuration validation.

use super::{Config, FILE_SENTINEL};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.endpoints.is_empty() {
        return Err(MigrateError::Config(
            "configuration defines no endpoints".into(),
        ));
    }

    for (name, ep) in &config.endpoints {
        if name.starts_with(FILE_SENTINEL) {
            return Err(MigrateError::Config(format!(
                "endpoint name '{}' is reserved for file export",
                name
            )));
        }
        if ep.hostname.is_empty() {
            return Err(MigrateError::Config(format!("{}.hostname is required", name)));
        }
        if ep.database.is_empty() {
            return Err(MigrateError::Config(format!("{}.database is required", name)));
        }
        if ep.username.is_empty() {
            return Err(MigrateError::Config(format!("{}.username is required", name)));
        }
        if ep.port == Some(0) {
            return Err(MigrateError::Config(format!("{}.port must not be 0", name)));
        }
        if ep.link_server.as_deref() == Some("") {
            return Err(MigrateError::Config(format!(
                "{}.link_server must not be empty when set",
                name
            )));
        }
    }

    Ok(())
}
