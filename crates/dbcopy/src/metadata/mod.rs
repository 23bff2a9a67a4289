//! Timeout-scoped catalog access.
//!
//! [`MetadataReader`] wraps an endpoint's [`CatalogReader`](crate::core::CatalogReader) with the
//! per-operation timeout, the system-schema deny-list and the name
//! exclusion pattern. Column descriptions come back already rendered for the
//! destination dialect of the supplied [`Translator`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::core::schema::{
    ColumnMeta, IndexMeta, ObjectKind, RenderedColumn, RoutineMeta, TableMeta, ViewMeta,
};
use crate::core::traits::{Endpoint, TableKind};
use crate::error::{MigrateError, Result};
use crate::translate::Translator;

/// Catalog reader bound to one endpoint and one timeout.
#[derive(Clone)]
pub struct MetadataReader {
    endpoint: Arc<dyn Endpoint>,
    timeout: Duration,
}

impl MetadataReader {
    pub fn new(endpoint: Arc<dyn Endpoint>, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }

    pub fn endpoint(&self) -> &Arc<dyn Endpoint> {
        &self.endpoint
    }

    /// Run one catalog query under the timeout.
    async fn scoped<T, F>(&self, operation: impl FnOnce() -> String, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MigrateError::timeout(operation(), self.timeout.as_secs())),
        }
    }

    /// Non-system schemas, ordered by name.
    pub async fn list_schemas(&self) -> Result<Vec<String>> {
        let dialect = self.endpoint.dialect();
        let mut schemas = self
            .scoped(|| "listing schemas".to_string(), self.endpoint.list_schemas())
            .await?;
        schemas.retain(|s| !dialect.is_system_schema(s));
        schemas.sort();
        debug!("{}: {} user schemas", self.endpoint.info().name, schemas.len());
        Ok(schemas)
    }

    pub async fn list_tables(&self, schema: &str, kind: TableKind) -> Result<Vec<String>> {
        self.scoped(
            || format!("listing tables in {}", schema),
            self.endpoint.list_tables(schema, kind),
        )
        .await
    }

    pub async fn list_views(&self, schema: &str) -> Result<Vec<String>> {
        self.scoped(
            || format!("listing views in {}", schema),
            self.endpoint.list_views(schema),
        )
        .await
    }

    pub async fn list_routines(&self, schema: &str) -> Result<Vec<String>> {
        self.scoped(
            || format!("listing routines in {}", schema),
            self.endpoint.list_routines(schema),
        )
        .await
    }

    pub async fn list_indexes(&self, schema: &str) -> Result<Vec<String>> {
        self.scoped(
            || format!("listing indexes in {}", schema),
            self.endpoint.list_indexes(schema),
        )
        .await
    }

    /// Names of one kind in `schema`, minus those matching `exclude`.
    pub async fn list_objects(
        &self,
        schema: &str,
        kind: ObjectKind,
        exclude: Option<&Regex>,
    ) -> Result<Vec<String>> {
        let mut names = match kind {
            ObjectKind::Tables => self.list_tables(schema, TableKind::BaseTable).await?,
            ObjectKind::Views => self.list_views(schema).await?,
            ObjectKind::Routines => self.list_routines(schema).await?,
            ObjectKind::Indexes => self.list_indexes(schema).await?,
        };
        if let Some(re) = exclude {
            names.retain(|n| !re.is_match(n));
        }
        debug!("{}: {} {} selected", schema, names.len(), kind);
        Ok(names)
    }

    /// Raw catalog columns in ordinal order.
    pub async fn describe_raw_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnMeta>> {
        let mut columns = self
            .scoped(
                || format!("describing columns of {}.{}", schema, table),
                self.endpoint.describe_columns(schema, table),
            )
            .await?;
        if columns.is_empty() {
            return Err(MigrateError::metadata(
                format!("{}.{}", schema, table),
                "table not found or has no columns",
            ));
        }
        columns.sort_by_key(|c| c.ordinal_pos);
        Ok(columns)
    }

    /// Columns rendered for the translator's destination dialect.
    ///
    /// Lossy type mappings are logged once per column.
    pub async fn describe_columns(
        &self,
        schema: &str,
        table: &str,
        translator: &Translator,
    ) -> Result<Vec<RenderedColumn>> {
        let columns = self.describe_raw_columns(schema, table).await?;
        let rendered = translator.render_columns(&columns)?;
        for col in &rendered {
            if let Some(w) = &col.warning {
                warn!("{}.{}.{}: {}", schema, table, col.name(), w);
            }
        }
        Ok(rendered)
    }

    pub async fn describe_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.scoped(
            || format!("describing primary key of {}.{}", schema, table),
            self.endpoint.describe_primary_key(schema, table),
        )
        .await
    }

    pub async fn describe_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexMeta>> {
        self.scoped(
            || format!("describing indexes of {}.{}", schema, table),
            self.endpoint.describe_indexes(schema, table),
        )
        .await
    }

    pub async fn describe_index(&self, schema: &str, index: &str) -> Result<IndexMeta> {
        self.scoped(
            || format!("describing index {}.{}", schema, index),
            self.endpoint.describe_index(schema, index),
        )
        .await?
        .ok_or_else(|| not_found(schema, index, "index"))
    }

    pub async fn describe_view(&self, schema: &str, view: &str) -> Result<ViewMeta> {
        self.scoped(
            || format!("describing view {}.{}", schema, view),
            self.endpoint.describe_view(schema, view),
        )
        .await?
        .ok_or_else(|| not_found(schema, view, "view"))
    }

    pub async fn describe_routine(&self, schema: &str, routine: &str) -> Result<RoutineMeta> {
        self.scoped(
            || format!("describing routine {}.{}", schema, routine),
            self.endpoint.describe_routine(schema, routine),
        )
        .await?
        .ok_or_else(|| not_found(schema, routine, "routine"))
    }

    /// Columns, primary key and indexes of one table.
    pub async fn describe_table(
        &self,
        schema: &str,
        table: &str,
        translator: &Translator,
    ) -> Result<TableMeta> {
        let columns = self.describe_columns(schema, table, translator).await?;
        let primary_key = self.describe_primary_key(schema, table).await?;
        let indexes = self.describe_indexes(schema, table).await?;
        Ok(TableMeta {
            schema: schema.to_string(),
            name: table.to_string(),
            columns,
            primary_key,
            indexes,
        })
    }
}

fn not_found(schema: &str, name: &str, kind: &str) -> MigrateError {
    MigrateError::metadata(format!("{}.{}", schema, name), format!("{} not found", kind))
}
