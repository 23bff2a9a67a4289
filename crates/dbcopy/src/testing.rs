//! In-memory endpoint for unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::dialect::Dialect;
use crate::core::schema::{ColumnMeta, IndexMeta, RoutineMeta, ViewMeta};
use crate::core::traits::{
    CatalogReader, Endpoint, EndpointInfo, QueryOutput, StatementExecutor, TableKind,
};
use crate::error::{MigrateError, Result};

/// Catalog of a single schema plus execution bookkeeping.
pub struct MockEndpoint {
    pub info: EndpointInfo,
    pub schemas: Vec<String>,
    pub tables: BTreeMap<String, Vec<ColumnMeta>>,
    pub primary_keys: BTreeMap<String, Vec<String>>,
    pub indexes: Vec<IndexMeta>,
    pub views: BTreeMap<String, String>,
    pub routines: BTreeMap<String, RoutineMeta>,
    /// Object names whose describe calls fail.
    pub failing: HashSet<String>,
    /// Statements containing one of these fragments fail to execute.
    pub failing_statements: Vec<String>,
    /// Artificial latency of describe calls.
    pub delay: Duration,
    pub executed: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockEndpoint {
    pub fn new(name: &str, dialect: Dialect) -> Self {
        Self {
            info: EndpointInfo {
                name: name.to_string(),
                dialect,
                host: "db.internal".to_string(),
                port: dialect.default_port(),
                database: "erp".to_string(),
                link_server: None,
            },
            schemas: vec!["public".to_string()],
            tables: BTreeMap::new(),
            primary_keys: BTreeMap::new(),
            indexes: Vec::new(),
            views: BTreeMap::new(),
            routines: BTreeMap::new(),
            failing: HashSet::new(),
            failing_statements: Vec::new(),
            delay: Duration::ZERO,
            executed: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_schemas(mut self, schemas: &[&str]) -> Self {
        self.schemas = schemas.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnMeta>, pk: &[&str]) -> Self {
        self.tables.insert(name.to_string(), columns);
        self.primary_keys
            .insert(name.to_string(), pk.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_view(mut self, name: &str, definition: &str) -> Self {
        self.views.insert(name.to_string(), definition.to_string());
        self
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn with_index(mut self, table: &str, name: &str, columns: &[&str], unique: bool) -> Self {
        self.indexes.push(IndexMeta {
            schema: self.schemas.first().cloned().unwrap_or_default(),
            table: table.to_string(),
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            is_unique: unique,
            is_primary_key: false,
        });
        self
    }

    /// SQL Server index names are only unique per table.
    fn index_key(&self, index: &IndexMeta) -> String {
        match self.info.dialect {
            Dialect::Mssql => index.qualified_name(),
            Dialect::Postgres => index.name.clone(),
        }
    }

    async fn enter(&self, object: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(object) {
            return Err(MigrateError::metadata(object, "relation does not exist"));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for MockEndpoint {
    fn dialect(&self) -> Dialect {
        self.info.dialect
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(self.schemas.clone())
    }

    async fn list_tables(&self, _schema: &str, kind: TableKind) -> Result<Vec<String>> {
        match kind {
            TableKind::BaseTable => Ok(self.tables.keys().cloned().collect()),
            TableKind::View => Ok(self.views.keys().cloned().collect()),
        }
    }

    async fn list_views(&self, _schema: &str) -> Result<Vec<String>> {
        Ok(self.views.keys().cloned().collect())
    }

    async fn list_routines(&self, _schema: &str) -> Result<Vec<String>> {
        Ok(self.routines.keys().cloned().collect())
    }

    async fn list_indexes(&self, _schema: &str) -> Result<Vec<String>> {
        Ok(self
            .indexes
            .iter()
            .filter(|i| !i.is_primary_key)
            .map(|i| self.index_key(i))
            .collect())
    }

    async fn describe_columns(&self, _schema: &str, table: &str) -> Result<Vec<ColumnMeta>> {
        self.enter(table).await?;
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    async fn describe_primary_key(&self, _schema: &str, table: &str) -> Result<Vec<String>> {
        Ok(self.primary_keys.get(table).cloned().unwrap_or_default())
    }

    async fn describe_indexes(&self, _schema: &str, table: &str) -> Result<Vec<IndexMeta>> {
        Ok(self
            .indexes
            .iter()
            .filter(|i| i.table == table)
            .cloned()
            .collect())
    }

    async fn describe_index(&self, _schema: &str, index: &str) -> Result<Option<IndexMeta>> {
        self.enter(index).await?;
        Ok(self
            .indexes
            .iter()
            .find(|i| self.index_key(i) == index)
            .cloned())
    }

    async fn describe_view(&self, schema: &str, view: &str) -> Result<Option<ViewMeta>> {
        self.enter(view).await?;
        Ok(self.views.get(view).map(|definition| ViewMeta {
            schema: schema.to_string(),
            name: view.to_string(),
            definition: definition.clone(),
        }))
    }

    async fn describe_routine(&self, _schema: &str, routine: &str) -> Result<Option<RoutineMeta>> {
        self.enter(routine).await?;
        Ok(self.routines.get(routine).cloned())
    }
}

#[async_trait]
impl StatementExecutor for MockEndpoint {
    async fn execute(&self, sql: &str) -> Result<()> {
        if self.failing_statements.iter().any(|f| sql.contains(f.as_str())) {
            return Err(MigrateError::execution(sql, "permission denied"));
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn query(&self, _sql: &str) -> Result<QueryOutput> {
        Ok(QueryOutput {
            columns: vec!["?column?".to_string()],
            rows: vec![vec![Some("1".to_string())]],
        })
    }
}

#[async_trait]
impl Endpoint for MockEndpoint {
    fn info(&self) -> &EndpointInfo {
        &self.info
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}
