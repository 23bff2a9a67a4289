//! Type mapping between dialects.
//!
//! # Available Mappers
//!
//! - [`PostgresToPostgresMapper`]: passthrough with lengths
//! - [`MssqlToPostgresMapper`]: SQL Server → PostgreSQL
//! - [`PostgresToMssqlMapper`]: PostgreSQL → SQL Server (some lossy)
//! - [`MssqlToMssqlMapper`]: passthrough with lengths and `MAX`
//!
//! Mappers are registered in a [`TranslatorCatalog`](crate::core::TranslatorCatalog)
//! and retrieved by dialect pair:
//!
//! ```rust,ignore
//! let catalog = TranslatorCatalog::with_builtins();
//! let translator = catalog.translator(Dialect::Mssql, Dialect::Postgres)?;
//! ```

mod typemap;

pub use typemap::{
    MssqlToMssqlMapper, MssqlToPostgresMapper, PostgresToMssqlMapper, PostgresToPostgresMapper,
};
