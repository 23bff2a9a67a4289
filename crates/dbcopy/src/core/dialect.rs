//! The closed set of supported SQL dialects.
//!
//! [`Dialect`] is the key for everything dialect-specific: identifier
//! quoting, system-schema deny-lists, default ports and translator lookup
//! (see [`crate::core::catalog::TranslatorCatalog`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::identifier::{quote_literal, quote_mssql, quote_pg};
use crate::error::{MigrateError, Result};

/// PostgreSQL schemas never offered for copying.
const POSTGRES_SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// SQL Server schemas never offered for copying (catalog views and built-in roles).
const MSSQL_SYSTEM_SCHEMAS: &[&str] = &[
    "INFORMATION_SCHEMA",
    "db_accessadmin",
    "db_backupoperator",
    "db_datareader",
    "db_datawriter",
    "db_ddladmin",
    "db_denydatareader",
    "db_denydatawriter",
    "db_owner",
    "db_securityadmin",
    "guest",
    "sys",
];

/// SQL dialect of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL family.
    #[serde(alias = "pgx", alias = "postgresql", alias = "pg")]
    Postgres,
    /// SQL Server family.
    #[serde(alias = "sqlserver")]
    Mssql,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 2] = [Dialect::Postgres, Dialect::Mssql];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mssql => "mssql",
        }
    }

    /// Default TCP port.
    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::Mssql => 1433,
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote_ident(&self, name: &str) -> Result<String> {
        match self {
            Dialect::Postgres => quote_pg(name),
            Dialect::Mssql => quote_mssql(name),
        }
    }

    /// Quote a schema-qualified object name.
    pub fn qualify(&self, schema: &str, name: &str) -> Result<String> {
        Ok(format!(
            "{}.{}",
            self.quote_ident(schema)?,
            self.quote_ident(name)?
        ))
    }

    /// Quote and comma-join a column list (no spaces, matching generated DDL).
    pub fn quote_list<S: AsRef<str>>(&self, names: &[S]) -> Result<String> {
        let quoted = names
            .iter()
            .map(|n| self.quote_ident(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join(","))
    }

    /// Quote a string literal.
    pub fn quote_literal(&self, value: &str) -> String {
        quote_literal(value)
    }

    /// Schemas excluded from `ListSchemas`.
    pub fn system_schemas(&self) -> &'static [&'static str] {
        match self {
            Dialect::Postgres => POSTGRES_SYSTEM_SCHEMAS,
            Dialect::Mssql => MSSQL_SYSTEM_SCHEMAS,
        }
    }

    /// Whether `schema` is on this dialect's deny-list.
    pub fn is_system_schema(&self, schema: &str) -> bool {
        match self {
            Dialect::Postgres => {
                schema.starts_with("pg_temp_")
                    || schema.starts_with("pg_toast_temp_")
                    || POSTGRES_SYSTEM_SCHEMAS.contains(&schema)
            }
            Dialect::Mssql => MSSQL_SYSTEM_SCHEMAS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(schema)),
        }
    }

    /// Whether the dialect can expose a remote table as a local foreign table.
    /// Otherwise foreign links are emitted as cross-server views.
    pub fn supports_foreign_tables(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Longest identifier the server keeps, in bytes. PostgreSQL silently
    /// truncates past NAMEDATALEN - 1.
    pub fn max_identifier_len(&self) -> usize {
        match self {
            Dialect::Postgres => 63,
            Dialect::Mssql => 128,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" | "pg" => Ok(Dialect::Postgres),
            "mssql" | "sqlserver" => Ok(Dialect::Mssql),
            other => Err(MigrateError::Config(format!(
                "Unknown driver '{}'. Valid values: postgres, mssql",
                other
            ))),
        }
    }
}
