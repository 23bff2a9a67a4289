//! PostgreSQL driver.
//!
//! - [`PostgresEndpoint`]: pooled connection implementing the catalog reader
//!   (`reader`) and the statement executor (`writer`)

mod reader;
mod writer;

pub use reader::PostgresEndpoint;
