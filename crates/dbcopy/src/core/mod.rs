//! Core abstractions shared by every dialect.
//!
//! - [`dialect`]: the closed set of supported dialects
//! - [`identifier`]: identifier validation and quoting
//! - [`schema`]: normalized catalog metadata records
//! - [`traits`]: catalog reader, statement executor, endpoint and type mapper traits
//! - [`catalog`]: translator registry keyed by dialect pair
//!
//! Driver modules (`drivers/mssql`, `drivers/postgres`) implement these
//! traits; everything above them works against the traits only.

pub mod catalog;
pub mod dialect;
pub mod identifier;
pub mod schema;
pub mod traits;

pub use catalog::TranslatorCatalog;
pub use dialect::Dialect;
pub use schema::{
    ColumnMeta, IndexMeta, ObjectKind, RenderedColumn, RoutineKind, RoutineMeta, RoutineParam,
    TableMeta, TypeClass, ViewMeta,
};
pub use traits::{
    CatalogReader, Endpoint, EndpointInfo, QueryOutput, StatementExecutor, TableKind, TypeMapper,
    TypeMapping,
};
