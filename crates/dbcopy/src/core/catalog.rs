//! Translator catalog for explicit dependency injection.
//!
//! The [`TranslatorCatalog`] maps a (source, destination) dialect pair to the
//! type mapper used for that pair. It is constructed explicitly and handed to
//! the orchestrator rather than living in global state, so tests can register
//! their own mappers.
//!
//! Adding a dialect pair is a single [`TranslatorCatalog::register`] call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MigrateError, Result};
use crate::translate::Translator;

use super::dialect::Dialect;
use super::traits::TypeMapper;

/// Registry of type mappers keyed by dialect pair.
///
/// ```rust,ignore
/// let catalog = TranslatorCatalog::with_builtins();
/// let translator = catalog.translator(Dialect::Mssql, Dialect::Postgres)?;
/// ```
#[derive(Default, Clone)]
pub struct TranslatorCatalog {
    mappers: HashMap<(Dialect, Dialect), Arc<dyn TypeMapper>>,
}

impl TranslatorCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with all four PostgreSQL/SQL Server pairs registered.
    pub fn with_builtins() -> Self {
        use crate::dialect::{
            MssqlToMssqlMapper, MssqlToPostgresMapper, PostgresToMssqlMapper,
            PostgresToPostgresMapper,
        };

        let mut catalog = Self::new();
        catalog.register(Arc::new(PostgresToPostgresMapper::new()));
        catalog.register(Arc::new(MssqlToPostgresMapper::new()));
        catalog.register(Arc::new(PostgresToMssqlMapper::new()));
        catalog.register(Arc::new(MssqlToMssqlMapper::new()));
        catalog
    }

    /// Register a mapper under its own (source, target) pair, replacing any
    /// previous mapper for that pair.
    pub fn register(&mut self, mapper: Arc<dyn TypeMapper>) {
        let key = (mapper.source_dialect(), mapper.target_dialect());
        self.mappers.insert(key, mapper);
    }

    /// Whether a pair is registered.
    pub fn supports(&self, source: Dialect, dest: Dialect) -> bool {
        self.mappers.contains_key(&(source, dest))
    }

    /// Type mapper for a pair.
    pub fn mapper(&self, source: Dialect, dest: Dialect) -> Result<Arc<dyn TypeMapper>> {
        self.mappers
            .get(&(source, dest))
            .cloned()
            .ok_or(MigrateError::UnsupportedDialectPair {
                from: source,
                to: dest,
            })
    }

    /// DDL translator for a pair.
    ///
    /// Fails with [`MigrateError::UnsupportedDialectPair`] before any work is
    /// scheduled when the pair is not registered.
    pub fn translator(&self, source: Dialect, dest: Dialect) -> Result<Translator> {
        Ok(Translator::new(self.mapper(source, dest)?))
    }

    /// Registered pairs, sorted.
    pub fn pairs(&self) -> Vec<(Dialect, Dialect)> {
        let mut pairs: Vec<_> = self.mappers.keys().copied().collect();
        pairs.sort();
        pairs
    }
}

impl std::fmt::Debug for TranslatorCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorCatalog")
            .field("pairs", &self.pairs())
            .finish()
    }
}
