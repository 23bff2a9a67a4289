//! # dbcopy
//!
//! Schema translation and replication between PostgreSQL and SQL Server.
//!
//! The library reads catalog metadata from a source endpoint, translates
//! tables, indexes, views and routines into the destination dialect's DDL,
//! and applies the statements to a destination endpoint or exports them to
//! files:
//!
//! - **Translation** keyed by (source, destination) dialect pair
//! - **Foreign links** and **sync procedures** for incremental replication
//! - **Bounded concurrency** with per-object failure isolation
//! - **Per-operation timeouts** on every catalog query and DDL statement
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbcopy::{Config, Destination, ObjectKind, Orchestrator, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> dbcopy::Result<()> {
//!     let config = Config::load("config.yml")?;
//!     let mut options = RunOptions::new("erp", Destination::parse("warehouse"));
//!     options.kinds = vec![ObjectKind::Tables, ObjectKind::Views];
//!     let summary = Orchestrator::new(&config, options).await?.run().await?;
//!     println!("{} objects copied", summary.objects_succeeded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod scheduler;
pub mod sink;
pub mod translate;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use crate::core::{
    CatalogReader, Dialect, Endpoint, EndpointInfo, ObjectKind, QueryOutput, StatementExecutor,
    TranslatorCatalog,
};
pub use config::{Config, Destination, EndpointConfig, RunOptions, TableActions};
pub use connection::ConnectionPair;
pub use error::{MigrateError, Result};
pub use orchestrator::{Orchestrator, RunStatus, RunSummary};
pub use scheduler::{BatchReport, ObjectStatus, TaskScheduler};
pub use sink::{Artifact, ArtifactKind, Sink};
pub use translate::{DdlPair, Translator};
