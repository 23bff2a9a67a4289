//! Error types for schema copy operations.

use thiserror::Error;

use crate::core::dialect::Dialect;

/// Exit code for configuration problems (bad YAML, unknown endpoint, bad flags).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when an endpoint cannot be opened.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for a dialect pair with no registered translator.
pub const EXIT_UNSUPPORTED_PAIR: u8 = 3;
/// Exit code when a named schema does not exist.
pub const EXIT_SCHEMA_NOT_FOUND: u8 = 4;
/// Exit code when the run completed but at least one object failed.
pub const EXIT_PARTIAL_FAILURE: u8 = 5;
/// Exit code for an operation that exceeded its timeout.
pub const EXIT_TIMEOUT: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code when the run was interrupted.
pub const EXIT_CANCELLED: u8 = 8;
/// Exit code for anything else.
pub const EXIT_OTHER: u8 = 10;

/// Main error type for schema copy operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, unknown endpoint, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// An endpoint could not be opened or failed its liveness check.
    #[error("Connection to '{endpoint}' failed: {message}")]
    Connection { endpoint: String, message: String },

    /// No translator is registered for the requested dialect pair.
    #[error("Unsupported dialect pair: {from} -> {to}")]
    UnsupportedDialectPair { from: Dialect, to: Dialect },

    /// A catalog query failed.
    #[error("Metadata query failed for {object}: {message}")]
    Metadata { object: String, message: String },

    /// A query or statement exceeded its timeout.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// A destination statement failed.
    #[error("Statement failed: {message}\n  Statement: {statement}")]
    Execution { statement: String, message: String },

    /// The selection produced no objects for a batch.
    #[error("No {kind} selected in schema {schema}")]
    NoObjectsSelected { schema: String, kind: String },

    /// Table has no primary key (required for sync procedures)
    #[error("Table {0} has no primary key - sync procedures require primary keys")]
    NoPrimaryKey(String),

    /// A named schema does not exist on the endpoint.
    #[error("Schema '{schema}' not found on '{endpoint}'")]
    SchemaNotFound { endpoint: String, schema: String },

    /// Identifier rejected before it could be embedded in SQL.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The run finished but some objects failed.
    #[error("{failed} of {total} objects failed")]
    PartialFailure { failed: usize, total: usize },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Connection error for the named endpoint.
    pub fn connection(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Create a Metadata error for a catalog object.
    pub fn metadata(object: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Metadata {
            object: object.into(),
            message: message.to_string(),
        }
    }

    /// Create an Execution error, keeping the statement that failed.
    pub fn execution(statement: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Execution {
            statement: statement.into(),
            message: message.to_string(),
        }
    }

    /// Create a Timeout error.
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        MigrateError::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Whether this error aborts the whole run rather than a single object.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::Config(_)
                | MigrateError::Connection { .. }
                | MigrateError::UnsupportedDialectPair { .. }
                | MigrateError::SchemaNotFound { .. }
                | MigrateError::Yaml(_)
                | MigrateError::Cancelled
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::InvalidIdentifier(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::UnsupportedDialectPair { .. } => EXIT_UNSUPPORTED_PAIR,
            MigrateError::SchemaNotFound { .. } => EXIT_SCHEMA_NOT_FOUND,
            MigrateError::PartialFailure { .. } => EXIT_PARTIAL_FAILURE,
            MigrateError::Timeout { .. } => EXIT_TIMEOUT,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_OTHER,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for schema copy operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
