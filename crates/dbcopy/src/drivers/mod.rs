//! Database driver implementations.
//!
//! - [`mssql`]: Microsoft SQL Server driver (Tiberius + bb8)
//! - [`postgres`]: PostgreSQL driver (tokio-postgres + deadpool)
//! - [`common`]: shared TLS helpers
//!
//! Each driver implements [`Endpoint`](crate::core::traits::Endpoint), which
//! combines the catalog reader and the statement executor. Everything above
//! this module holds endpoints as `Arc<dyn Endpoint>` and never names a
//! concrete driver.

pub mod common;
pub mod mssql;
pub mod postgres;

use std::sync::Arc;

pub use common::{MssqlTls, SslMode, TlsBuilder};
pub use mssql::MssqlEndpoint;
pub use postgres::PostgresEndpoint;

use crate::config::EndpointConfig;
use crate::core::dialect::Dialect;
use crate::core::traits::Endpoint;
use crate::error::Result;

/// Open a pooled endpoint for a configuration entry.
pub async fn connect(
    name: &str,
    config: &EndpointConfig,
    max_conns: usize,
) -> Result<Arc<dyn Endpoint>> {
    match config.driver {
        Dialect::Postgres => Ok(Arc::new(
            PostgresEndpoint::connect(name, config, max_conns).await?,
        )),
        Dialect::Mssql => Ok(Arc::new(
            MssqlEndpoint::connect(name, config, max_conns).await?,
        )),
    }
}
