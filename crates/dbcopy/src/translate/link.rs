//! Foreign links: destination-side relations that read the source table.
//!
//! PostgreSQL destinations get a foreign table (tds_fdw for a SQL Server
//! source, postgres_fdw for a PostgreSQL source). SQL Server destinations get
//! a view over a four-part linked-server name, with character columns forced
//! to the destination collation.

use serde::Serialize;

use crate::core::dialect::Dialect;
use crate::core::schema::RenderedColumn;
use crate::core::traits::EndpointInfo;
use crate::error::{MigrateError, Result};

use super::{staging_name, DdlPair, Translator};

/// Where a foreign link points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSource {
    pub dialect: Dialect,
    /// FDW server name or linked-server name.
    pub server: String,
    pub database: String,
    pub schema: String,
}

impl LinkSource {
    /// Describe `schema` on the source endpoint as seen from a `dest` dialect.
    ///
    /// Without an explicit `link_server`, PostgreSQL destinations use the
    /// endpoint's logical name as FDW server and SQL Server destinations use
    /// its host name as linked server.
    pub fn from_endpoint(info: &EndpointInfo, dest: Dialect, schema: &str) -> Self {
        let server = info.link_server.clone().unwrap_or_else(|| match dest {
            Dialect::Postgres => info.name.clone(),
            Dialect::Mssql => info.host.clone(),
        });
        Self {
            dialect: info.dialect,
            server,
            database: info.database.clone(),
            schema: schema.to_string(),
        }
    }
}

impl Translator {
    /// DROP/CREATE for the staging relation `<schema>.<table><suffix>` that
    /// reads `table` on the source.
    pub fn generate_foreign_link(
        &self,
        schema: &str,
        table: &str,
        columns: &[RenderedColumn],
        source: &LinkSource,
    ) -> Result<DdlPair> {
        if columns.is_empty() {
            return Err(MigrateError::metadata(
                format!("{}.{}", source.schema, table),
                "table has no columns",
            ));
        }

        let dest = self.dest();
        let staging = dest.qualify(schema, &staging_name(table))?;

        if dest.supports_foreign_tables() {
            let mut defs = Vec::with_capacity(columns.len());
            for col in columns {
                let mut def = format!("{} {}", dest.quote_ident(col.name())?, col.target_type);
                if !col.meta.is_nullable {
                    def.push_str(" NOT NULL");
                }
                defs.push(def);
            }

            let options = match source.dialect {
                Dialect::Mssql => format!(
                    "table_name {}, row_estimate_method 'showplan_all', match_column_names '0'",
                    dest.quote_literal(&Dialect::Mssql.qualify(&source.schema, table)?)
                ),
                Dialect::Postgres => format!(
                    "schema_name {}, table_name {}",
                    dest.quote_literal(&source.schema),
                    dest.quote_literal(table)
                ),
            };

            Ok(DdlPair::new(
                format!("DROP FOREIGN TABLE IF EXISTS {} CASCADE;", staging),
                format!(
                    "CREATE FOREIGN TABLE IF NOT EXISTS {} ({}) SERVER {} OPTIONS ({});",
                    staging,
                    defs.join(","),
                    dest.quote_ident(&source.server)?,
                    options
                ),
            ))
        } else {
            let mut select = Vec::with_capacity(columns.len());
            for col in columns {
                let name = dest.quote_ident(col.name())?;
                if col.meta.type_class.is_character() {
                    select.push(format!("{} COLLATE database_default AS {}", name, name));
                } else {
                    select.push(name);
                }
            }

            let remote = format!(
                "{}.{}.{}",
                dest.quote_ident(&source.server)?,
                dest.quote_ident(&source.database)?,
                dest.qualify(&source.schema, table)?
            );

            Ok(DdlPair::new(
                format!("DROP VIEW IF EXISTS {};", staging),
                format!(
                    "CREATE VIEW {} AS SELECT {} FROM {};",
                    staging,
                    select.join(","),
                    remote
                ),
            ))
        }
    }
}
