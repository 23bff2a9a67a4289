//! Source/destination endpoint pair shared by every object task.

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, Destination, RunOptions};
use crate::core::dialect::Dialect;
use crate::core::traits::{Endpoint, EndpointInfo};
use crate::drivers;
use crate::error::Result;

/// Open endpoints for one run.
///
/// Read-only once built; tasks share it through an `Arc`. Under file export
/// there is no destination connection and `dest` is the source endpoint.
#[derive(Clone)]
pub struct ConnectionPair {
    source: Arc<dyn Endpoint>,
    dest: Arc<dyn Endpoint>,
    /// Dialect the generated DDL targets.
    dest_dialect: Dialect,
    exporting: bool,
}

impl ConnectionPair {
    /// Open the source and, unless exporting, the destination endpoint.
    ///
    /// Either failure aborts the run before any object work starts.
    pub async fn open(config: &Config, options: &RunOptions) -> Result<Self> {
        let pool_size = options.jobs + 1;
        let source = drivers::connect(
            &options.source,
            config.endpoint(&options.source)?,
            pool_size,
        )
        .await?;

        match &options.destination {
            Destination::Endpoint(name) => {
                let dest = drivers::connect(name, config.endpoint(name)?, pool_size).await?;
                Ok(Self::new(source, dest))
            }
            Destination::Files(dir) => {
                let dialect = options.export_dialect.unwrap_or(source.dialect());
                info!(
                    "Exporting {} DDL to {} (no destination connection)",
                    dialect,
                    dir.display()
                );
                Ok(Self::exporting(source, dialect))
            }
        }
    }

    /// Pair two already-open endpoints.
    pub fn new(source: Arc<dyn Endpoint>, dest: Arc<dyn Endpoint>) -> Self {
        let dest_dialect = dest.dialect();
        Self {
            source,
            dest,
            dest_dialect,
            exporting: false,
        }
    }

    /// Export-mode pair: the source doubles as the destination handle.
    pub fn exporting(source: Arc<dyn Endpoint>, dest_dialect: Dialect) -> Self {
        Self {
            dest: source.clone(),
            source,
            dest_dialect,
            exporting: true,
        }
    }

    pub fn source(&self) -> &Arc<dyn Endpoint> {
        &self.source
    }

    pub fn dest(&self) -> &Arc<dyn Endpoint> {
        &self.dest
    }

    pub fn source_dialect(&self) -> Dialect {
        self.source.dialect()
    }

    pub fn dest_dialect(&self) -> Dialect {
        self.dest_dialect
    }

    pub fn source_info(&self) -> &EndpointInfo {
        self.source.info()
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Close both endpoints.
    pub async fn close(&self) {
        self.source.close().await;
        if !self.exporting {
            self.dest.close().await;
        }
    }
}
