//! PostgreSQL endpoint and catalog reader.
//!
//! Connections come from a deadpool-postgres pool. Catalog queries read
//! `information_schema` where it is complete for non-owners and `pg_catalog`
//! otherwise (view and routine bodies, index column order).

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::config::EndpointConfig;
use crate::core::dialect::Dialect;
use crate::core::schema::{ColumnMeta, IndexMeta, RoutineKind, RoutineMeta, RoutineParam, ViewMeta};
use crate::core::traits::{CatalogReader, EndpointInfo, TableKind};
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const INDEX_COLUMNS_QUERY: &str = r#"
    SELECT i.relname::text,
           t.relname::text,
           ix.indisunique,
           ix.indisprimary,
           array_agg(a.attname::text ORDER BY array_position(ix.indkey, a.attnum))
    FROM pg_index ix
    JOIN pg_class i ON i.oid = ix.indexrelid
    JOIN pg_class t ON t.oid = ix.indrelid
    JOIN pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
    WHERE n.nspname = $1
"#;

/// PostgreSQL endpoint.
pub struct PostgresEndpoint {
    pub(super) pool: Pool,
    pub(super) info: EndpointInfo,
}

impl PostgresEndpoint {
    /// Open a pool to the endpoint and verify it with `SELECT 1`.
    pub async fn connect(name: &str, config: &EndpointConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.hostname);
        pg_config.port(config.port());
        pg_config.dbname(&config.database);
        pg_config.user(&config.username);
        pg_config.password(&config.password);
        pg_config.application_name("dbcopy");
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::new(config.ssl_mode).build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!(
                    "PostgreSQL TLS is disabled for '{}'. Credentials will be transmitted in plaintext.",
                    name
                );
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(max_conns.max(1))
            .build()
            .map_err(|e| MigrateError::pool(e, format!("creating PostgreSQL pool for '{}'", name)))?;

        let endpoint = Self {
            pool,
            info: EndpointInfo {
                name: name.to_string(),
                dialect: Dialect::Postgres,
                host: config.hostname.clone(),
                port: config.port(),
                database: config.database.clone(),
                link_server: config.link_server.clone(),
            },
        };

        let client = endpoint.client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(name, e))?;

        info!(
            "Connected to PostgreSQL: {} (pool_size={}, ssl_mode={})",
            config.address(),
            max_conns.max(1),
            config.ssl_mode
        );

        Ok(endpoint)
    }

    /// Check out a pooled connection.
    pub(super) async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(&self.info.name, e))
    }

    async fn query_strings(
        &self,
        object: &str,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(sql, params)
            .await
            .map_err(|e| MigrateError::metadata(object, e))?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn query_indexes(
        &self,
        schema: &str,
        filter: &str,
        value: &str,
    ) -> Result<Vec<IndexMeta>> {
        let client = self.client().await?;
        let sql = format!(
            "{} AND {} = $2 GROUP BY i.relname, t.relname, ix.indisunique, ix.indisprimary ORDER BY i.relname",
            INDEX_COLUMNS_QUERY, filter
        );
        let rows = client
            .query(sql.as_str(), &[&schema, &value])
            .await
            .map_err(|e| MigrateError::metadata(format!("{}.{}", schema, value), e))?;

        Ok(rows
            .iter()
            .map(|row| IndexMeta {
                schema: schema.to_string(),
                name: row.get(0),
                table: row.get(1),
                is_unique: row.get(2),
                is_primary_key: row.get(3),
                columns: row.get(4),
            })
            .collect())
    }

    async fn describe_parameters(&self, schema: &str, specific_name: &str) -> Result<Vec<RoutineParam>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT COALESCE(p.parameter_name::text, ''),
                       COALESCE(p.parameter_mode::text, 'IN'),
                       CASE WHEN p.data_type IN ('ARRAY', 'USER-DEFINED') THEN p.udt_name::text
                            ELSE p.data_type::text END,
                       p.character_maximum_length::int4,
                       p.numeric_precision::int4,
                       p.numeric_scale::int4
                FROM information_schema.parameters p
                WHERE p.specific_schema = $1 AND p.specific_name = $2
                ORDER BY p.ordinal_position
                "#,
                &[&schema, &specific_name],
            )
            .await
            .map_err(|e| MigrateError::metadata(format!("{}.{}", schema, specific_name), e))?;

        Ok(rows
            .iter()
            .map(|row| RoutineParam {
                name: row.get(0),
                mode: row.get(1),
                data_type: row.get(2),
                max_length: row.get(3),
                precision: row.get(4),
                scale: row.get(5),
            })
            .collect())
    }
}

#[async_trait]
impl CatalogReader for PostgresEndpoint {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        self.query_strings(
            "schemas",
            "SELECT nspname::text FROM pg_catalog.pg_namespace ORDER BY nspname",
            &[],
        )
        .await
    }

    async fn list_tables(&self, schema: &str, kind: TableKind) -> Result<Vec<String>> {
        self.query_strings(
            schema,
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = $2
            ORDER BY table_name
            "#,
            &[&schema, &kind.table_type()],
        )
        .await
    }

    async fn list_views(&self, schema: &str) -> Result<Vec<String>> {
        self.query_strings(
            schema,
            r#"
            SELECT c.relname::text
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relkind = 'v'
            ORDER BY c.relname
            "#,
            &[&schema],
        )
        .await
    }

    async fn list_routines(&self, schema: &str) -> Result<Vec<String>> {
        // Extension-owned and C-language routines have no portable body.
        self.query_strings(
            schema,
            r#"
            SELECT DISTINCT p.proname::text
            FROM pg_proc p
            JOIN pg_namespace n ON n.oid = p.pronamespace
            JOIN pg_language l ON l.oid = p.prolang
            WHERE n.nspname = $1
              AND p.prokind IN ('f', 'p')
              AND l.lanname NOT IN ('c', 'internal')
              AND NOT EXISTS (
                  SELECT 1 FROM pg_depend d WHERE d.objid = p.oid AND d.deptype = 'e'
              )
            ORDER BY 1
            "#,
            &[&schema],
        )
        .await
    }

    async fn list_indexes(&self, schema: &str) -> Result<Vec<String>> {
        self.query_strings(
            schema,
            r#"
            SELECT i.relname::text
            FROM pg_index ix
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_namespace n ON n.oid = i.relnamespace
            WHERE n.nspname = $1 AND NOT ix.indisprimary
            ORDER BY i.relname
            "#,
            &[&schema],
        )
        .await
    }

    async fn describe_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnMeta>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT column_name::text,
                       CASE WHEN data_type IN ('ARRAY', 'USER-DEFINED') THEN udt_name::text
                            ELSE data_type::text END,
                       character_maximum_length::int4,
                       numeric_precision::int4,
                       numeric_scale::int4,
                       is_nullable = 'YES',
                       COALESCE(column_default::text, ''),
                       ordinal_position::int4
                FROM information_schema.columns
                WHERE table_schema = $1 AND table_name = $2
                ORDER BY ordinal_position
                "#,
                &[&schema, &table],
            )
            .await
            .map_err(|e| MigrateError::metadata(format!("{}.{}", schema, table), e))?;

        let columns = rows
            .iter()
            .map(|row| {
                let mut col = ColumnMeta::new(row.get::<_, String>(0), row.get::<_, String>(1))
                    .with_default(row.get::<_, String>(6))
                    .at(row.get(7));
                col.max_length = row.get(2);
                col.precision = row.get(3);
                col.scale = row.get(4);
                col.is_nullable = row.get(5);
                col
            })
            .collect::<Vec<_>>();

        debug!("{}.{}: {} columns", schema, table, columns.len());
        Ok(columns)
    }

    async fn describe_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.query_strings(
            &format!("{}.{}", schema, table),
            r#"
            SELECT a.attname::text
            FROM pg_constraint c
            JOIN pg_class t ON t.oid = c.conrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(c.conkey)
            WHERE n.nspname = $1 AND t.relname = $2 AND c.contype = 'p'
            ORDER BY array_position(c.conkey, a.attnum)
            "#,
            &[&schema, &table],
        )
        .await
    }

    async fn describe_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexMeta>> {
        self.query_indexes(schema, "t.relname", table).await
    }

    async fn describe_index(&self, schema: &str, index: &str) -> Result<Option<IndexMeta>> {
        Ok(self
            .query_indexes(schema, "i.relname", index)
            .await?
            .into_iter()
            .next())
    }

    async fn describe_view(&self, schema: &str, view: &str) -> Result<Option<ViewMeta>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                r#"
                SELECT COALESCE(pg_get_viewdef(c.oid, true), '')
                FROM pg_class c
                JOIN pg_namespace n ON n.oid = c.relnamespace
                WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind IN ('v', 'm')
                "#,
                &[&schema, &view],
            )
            .await
            .map_err(|e| MigrateError::metadata(format!("{}.{}", schema, view), e))?;

        Ok(row.map(|row| ViewMeta {
            schema: schema.to_string(),
            name: view.to_string(),
            definition: row.get(0),
        }))
    }

    async fn describe_routine(&self, schema: &str, routine: &str) -> Result<Option<RoutineMeta>> {
        let client = self.client().await?;
        // Overloads share a name; the oldest one wins.
        let row = client
            .query_opt(
                r#"
                SELECT CASE p.prokind WHEN 'p' THEN 'PROCEDURE' ELSE 'FUNCTION' END,
                       l.lanname::text,
                       CASE WHEN p.prokind = 'p' THEN NULL ELSE pg_get_function_result(p.oid) END,
                       COALESCE(p.prosrc, ''),
                       (p.proname || '_' || p.oid)::text
                FROM pg_proc p
                JOIN pg_namespace n ON n.oid = p.pronamespace
                JOIN pg_language l ON l.oid = p.prolang
                WHERE n.nspname = $1 AND p.proname = $2 AND p.prokind IN ('f', 'p')
                ORDER BY p.oid
                LIMIT 1
                "#,
                &[&schema, &routine],
            )
            .await
            .map_err(|e| MigrateError::metadata(format!("{}.{}", schema, routine), e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let specific_name: String = row.get(4);
        let parameters = self.describe_parameters(schema, &specific_name).await?;

        Ok(Some(RoutineMeta {
            schema: schema.to_string(),
            name: routine.to_string(),
            kind: RoutineKind::parse(row.get::<_, &str>(0)),
            language: row.get(1),
            return_type: row.get(2),
            parameters,
            definition: row.get(3),
        }))
    }
}
