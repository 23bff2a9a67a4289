//! Core traits for dialect-agnostic schema copying.
//!
//! - [`CatalogReader`]: enumerates and describes catalog objects
//! - [`StatementExecutor`]: runs DDL and ad-hoc queries
//! - [`Endpoint`]: an open, pooled connection to one database
//! - [`TypeMapper`]: maps column types between a source and a target dialect

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

use super::dialect::Dialect;
use super::schema::{ColumnMeta, IndexMeta, RoutineMeta, ViewMeta};

/// Relation kind filter for [`CatalogReader::list_tables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableKind {
    /// Ordinary tables.
    #[default]
    BaseTable,
    /// Views.
    View,
}

impl TableKind {
    /// Value of `INFORMATION_SCHEMA.TABLES.TABLE_TYPE` for this kind.
    pub fn table_type(&self) -> &'static str {
        match self {
            TableKind::BaseTable => "BASE TABLE",
            TableKind::View => "VIEW",
        }
    }
}

/// Read catalog metadata from one endpoint.
///
/// Implementations return raw catalog content; deny-list filtering, name
/// filtering and timeouts are applied by [`crate::metadata::MetadataReader`].
/// Lookups of a single object return `Ok(None)` when it does not exist.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Dialect of the endpoint.
    fn dialect(&self) -> Dialect;

    /// All schema names, system schemas included.
    async fn list_schemas(&self) -> Result<Vec<String>>;

    /// Table names in a schema, ordered by name.
    async fn list_tables(&self, schema: &str, kind: TableKind) -> Result<Vec<String>>;

    /// View names in a schema, ordered by name.
    async fn list_views(&self, schema: &str) -> Result<Vec<String>>;

    /// Procedure and function names in a schema, ordered by name.
    async fn list_routines(&self, schema: &str) -> Result<Vec<String>>;

    /// Keys of indexes in a schema that do not back a primary key. Dialects
    /// that scope index names per table list them as `<table>.<index>`.
    async fn list_indexes(&self, schema: &str) -> Result<Vec<String>>;

    /// Columns of a table in ordinal order.
    async fn describe_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnMeta>>;

    /// Primary key column names in key order; empty when there is none.
    async fn describe_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Indexes on a table, primary-key-backed ones included and flagged.
    async fn describe_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexMeta>>;

    /// A single index by the key `list_indexes` returns.
    async fn describe_index(&self, schema: &str, index: &str) -> Result<Option<IndexMeta>>;

    /// A single view by name.
    async fn describe_view(&self, schema: &str, view: &str) -> Result<Option<ViewMeta>>;

    /// A single routine by name.
    async fn describe_routine(&self, schema: &str, routine: &str) -> Result<Option<RoutineMeta>>;
}

/// Tabular result of an ad-hoc query, every value rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    /// `None` marks SQL NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

/// Execute statements against one endpoint.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute one statement (or batch) and discard any result.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run a query and return the first result set as text.
    async fn query(&self, sql: &str) -> Result<QueryOutput>;
}

/// Non-secret description of an open endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    /// Logical name from the configuration file.
    pub name: String,
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Name other servers use to reach this endpoint (FDW server / linked server).
    pub link_server: Option<String>,
}

/// An open connection pool to one database.
#[async_trait]
pub trait Endpoint: CatalogReader + StatementExecutor {
    /// Connection details without credentials.
    fn info(&self) -> &EndpointInfo;

    /// Liveness probe (`SELECT 1`).
    async fn ping(&self) -> Result<()>;

    /// Close all pooled connections.
    async fn close(&self);
}

/// Map column types from a source dialect to a target dialect.
///
/// One implementation exists per supported (source, target) pair, so only
/// combinations that are actually used need mapping rules.
pub trait TypeMapper: Send + Sync {
    /// Source dialect.
    fn source_dialect(&self) -> Dialect;

    /// Target dialect.
    fn target_dialect(&self) -> Dialect;

    /// Map a catalog type to upper-case target type text.
    fn map_type(
        &self,
        data_type: &str,
        max_length: Option<i32>,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> TypeMapping;

    /// Translate a column's default expression to the target dialect.
    ///
    /// Returns an empty string when there is no default or it cannot be
    /// carried over.
    fn map_default(&self, col: &ColumnMeta) -> String;

    /// Map a column's type.
    fn map_column(&self, col: &ColumnMeta) -> TypeMapping {
        self.map_type(&col.data_type, col.max_length, col.precision, col.scale)
    }
}

/// Result of mapping a type from source to target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// Target type text (e.g., "CHARACTER VARYING(40)", "INT").
    pub target_type: String,
    /// Whether this mapping loses data or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(target_type: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_constructors() {
        let m = TypeMapping::lossless("INT");
        assert_eq!(m.target_type, "INT");
        assert!(!m.is_lossy);
        assert!(m.warning.is_none());

        let m = TypeMapping::lossy("TEXT", "geometry stored as text");
        assert!(m.is_lossy);
        assert_eq!(m.warning.as_deref(), Some("geometry stored as text"));
    }

    #[test]
    fn test_table_kind_filter_values() {
        assert_eq!(TableKind::default().table_type(), "BASE TABLE");
        assert_eq!(TableKind::View.table_type(), "VIEW");
    }
}
