//! SQL Server endpoint and catalog reader.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use crate::config::EndpointConfig;
use crate::core::dialect::Dialect;
use crate::core::schema::{ColumnMeta, IndexMeta, RoutineKind, RoutineMeta, RoutineParam, ViewMeta};
use crate::core::traits::{CatalogReader, EndpointInfo, TableKind};
use crate::drivers::common::MssqlTls;
use crate::error::{MigrateError, Result};

/// TCP keepalive interval for pooled connections.
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

const INDEX_QUERY: &str = r#"
    SELECT i.name, t.name, i.is_unique, i.is_primary_key,
           STUFF((
               SELECT ',' + c2.name
               FROM sys.index_columns ic2
               JOIN sys.columns c2 ON c2.object_id = ic2.object_id AND c2.column_id = ic2.column_id
               WHERE ic2.object_id = i.object_id AND ic2.index_id = i.index_id
                 AND ic2.is_included_column = 0
               ORDER BY ic2.key_ordinal
               FOR XML PATH(''), TYPE).value('.', 'nvarchar(max)'), 1, 1, '')
    FROM sys.indexes i
    JOIN sys.tables t ON t.object_id = i.object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    WHERE s.name = @P1 AND i.type > 0 AND t.is_ms_shipped = 0
"#;

/// bb8 connection manager for Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: EndpointConfig,
}

impl TiberiusConnectionManager {
    pub fn new(config: EndpointConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.hostname);
        config.port(self.config.port());
        config.database(&self.config.database);
        config.application_name("dbcopy");
        config.authentication(AuthMethod::sql_server(
            &self.config.username,
            &self.config.password,
        ));
        MssqlTls {
            encrypt: self.config.encrypt,
            trust_server_cert: self.config.trust_server_cert,
        }
        .apply(&mut config);
        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();

        let std_tcp = tcp.into_std().map_err(|e| tiberius::error::Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        })?;
        let socket = socket2::Socket::from(std_tcp);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(TCP_KEEPALIVE_INTERVAL)
            .with_interval(TCP_KEEPALIVE_INTERVAL);
        if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
            warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
        }

        let std_tcp: std::net::TcpStream = socket.into();
        std_tcp.set_nonblocking(true).ok();
        let tcp = TcpStream::from_std(std_tcp).map_err(|e| tiberius::error::Error::Io {
            kind: e.kind(),
            message: format!("Failed to convert socket: {}", e),
        })?;

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server endpoint.
pub struct MssqlEndpoint {
    pub(super) pool: Pool<TiberiusConnectionManager>,
    pub(super) info: EndpointInfo,
}

impl MssqlEndpoint {
    /// Open a pool to the endpoint and verify it with `SELECT 1`.
    pub async fn connect(name: &str, config: &EndpointConfig, max_conns: usize) -> Result<Self> {
        let max_size = max_conns.max(1) as u32;
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(30))
            .idle_timeout(Some(Duration::from_secs(300)))
            .max_lifetime(Some(Duration::from_secs(1800)))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| MigrateError::connection(name, e))?;

        let endpoint = Self {
            pool,
            info: EndpointInfo {
                name: name.to_string(),
                dialect: Dialect::Mssql,
                host: config.hostname.clone(),
                port: config.port(),
                database: config.database.clone(),
                link_server: config.link_server.clone(),
            },
        };

        {
            let mut client = endpoint.client().await?;
            client
                .simple_query("SELECT 1")
                .await
                .map_err(|e| MigrateError::connection(name, e))?
                .into_row()
                .await
                .map_err(|e| MigrateError::connection(name, e))?;
        }

        info!(
            "Connected to MSSQL: {} (pool_size={}, encrypt={})",
            config.address(),
            max_size,
            config.encrypt
        );

        Ok(endpoint)
    }

    pub(super) async fn client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(&self.info.name, e))
    }

    /// Run a parameterized catalog query and collect its first result set.
    async fn fetch(&self, object: &str, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        let mut client = self.client().await?;
        let mut query = Query::new(sql);
        for param in params {
            query.bind(*param);
        }
        let stream = query
            .query(&mut *client)
            .await
            .map_err(|e| MigrateError::metadata(object, e))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| MigrateError::metadata(object, e))
    }

    async fn fetch_strings(&self, object: &str, sql: &str, params: &[&str]) -> Result<Vec<String>> {
        Ok(self
            .fetch(object, sql, params)
            .await?
            .iter()
            .map(|row| text(row, 0))
            .collect())
    }

    async fn query_indexes(&self, schema: &str, filter: &str, value: &str) -> Result<Vec<IndexMeta>> {
        let sql = format!("{} AND {} = @P2 ORDER BY i.name", INDEX_QUERY, filter);
        let rows = self
            .fetch(&format!("{}.{}", schema, value), &sql, &[schema, value])
            .await?;

        Ok(rows
            .iter()
            .map(|row| IndexMeta {
                schema: schema.to_string(),
                name: text(row, 0),
                table: text(row, 1),
                is_unique: row.try_get::<bool, _>(2).ok().flatten().unwrap_or(false),
                is_primary_key: row.try_get::<bool, _>(3).ok().flatten().unwrap_or(false),
                columns: text(row, 4)
                    .split(',')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
            .collect())
    }

    async fn describe_parameters(&self, schema: &str, routine: &str) -> Result<Vec<RoutineParam>> {
        let rows = self
            .fetch(
                &format!("{}.{}", schema, routine),
                r#"
                SELECT PARAMETER_NAME, PARAMETER_MODE, DATA_TYPE,
                       CAST(CHARACTER_MAXIMUM_LENGTH AS INT),
                       CAST(NUMERIC_PRECISION AS INT),
                       CAST(COALESCE(NUMERIC_SCALE, DATETIME_PRECISION) AS INT)
                FROM INFORMATION_SCHEMA.PARAMETERS
                WHERE SPECIFIC_SCHEMA = @P1 AND SPECIFIC_NAME = @P2 AND IS_RESULT = 'NO'
                ORDER BY ORDINAL_POSITION
                "#,
                &[schema, routine],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| RoutineParam {
                name: text(row, 0),
                mode: text(row, 1),
                data_type: text(row, 2),
                max_length: int(row, 3),
                precision: int(row, 4),
                scale: int(row, 5),
            })
            .collect())
    }
}

fn text(row: &Row, idx: usize) -> String {
    row.try_get::<&str, _>(idx)
        .ok()
        .flatten()
        .unwrap_or_default()
        .to_string()
}

fn int(row: &Row, idx: usize) -> Option<i32> {
    row.try_get::<i32, _>(idx).ok().flatten()
}

#[async_trait]
impl CatalogReader for MssqlEndpoint {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        self.fetch_strings("schemas", "SELECT name FROM sys.schemas ORDER BY name", &[])
            .await
    }

    async fn list_tables(&self, schema: &str, kind: TableKind) -> Result<Vec<String>> {
        self.fetch_strings(
            schema,
            r#"
            SELECT TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = @P2
            ORDER BY TABLE_NAME
            "#,
            &[schema, kind.table_type()],
        )
        .await
    }

    async fn list_views(&self, schema: &str) -> Result<Vec<String>> {
        self.list_tables(schema, TableKind::View).await
    }

    async fn list_routines(&self, schema: &str) -> Result<Vec<String>> {
        self.fetch_strings(
            schema,
            r#"
            SELECT ROUTINE_NAME
            FROM INFORMATION_SCHEMA.ROUTINES
            WHERE ROUTINE_SCHEMA = @P1 AND ROUTINE_DEFINITION IS NOT NULL
            ORDER BY ROUTINE_NAME
            "#,
            &[schema],
        )
        .await
    }

    async fn list_indexes(&self, schema: &str) -> Result<Vec<String>> {
        self.fetch_strings(
            schema,
            r#"
            SELECT t.name + '.' + i.name
            FROM sys.indexes i
            JOIN sys.tables t ON t.object_id = i.object_id
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE s.name = @P1 AND i.type > 0 AND i.is_primary_key = 0 AND t.is_ms_shipped = 0
            ORDER BY t.name, i.name
            "#,
            &[schema],
        )
        .await
    }

    async fn describe_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnMeta>> {
        let rows = self
            .fetch(
                &format!("{}.{}", schema, table),
                r#"
                SELECT COLUMN_NAME, DATA_TYPE,
                       CAST(CHARACTER_MAXIMUM_LENGTH AS INT),
                       CAST(NUMERIC_PRECISION AS INT),
                       CAST(COALESCE(NUMERIC_SCALE, DATETIME_PRECISION) AS INT),
                       IS_NULLABLE,
                       ISNULL(COLUMN_DEFAULT, ''),
                       CAST(ORDINAL_POSITION AS INT)
                FROM INFORMATION_SCHEMA.COLUMNS
                WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
                ORDER BY ORDINAL_POSITION
                "#,
                &[schema, table],
            )
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let mut col = ColumnMeta::new(text(row, 0), text(row, 1))
                    .with_default(text(row, 6))
                    .at(int(row, 7).unwrap_or_default());
                col.max_length = int(row, 2);
                col.precision = int(row, 3);
                col.scale = int(row, 4);
                col.is_nullable = text(row, 5).eq_ignore_ascii_case("YES");
                col
            })
            .collect::<Vec<_>>();

        debug!("{}.{}: {} columns", schema, table, columns.len());
        Ok(columns)
    }

    async fn describe_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.fetch_strings(
            &format!("{}.{}", schema, table),
            r#"
            SELECT c.name
            FROM sys.indexes i
            JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
            JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
            JOIN sys.tables t ON t.object_id = i.object_id
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE s.name = @P1 AND t.name = @P2 AND i.is_primary_key = 1
            ORDER BY ic.key_ordinal
            "#,
            &[schema, table],
        )
        .await
    }

    async fn describe_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexMeta>> {
        self.query_indexes(schema, "t.name", table).await
    }

    /// `index` is the `<table>.<index>` key produced by `list_indexes`.
    async fn describe_index(&self, schema: &str, index: &str) -> Result<Option<IndexMeta>> {
        Ok(self
            .query_indexes(schema, "t.name + '.' + i.name", index)
            .await?
            .into_iter()
            .next())
    }

    async fn describe_view(&self, schema: &str, view: &str) -> Result<Option<ViewMeta>> {
        // Encrypted modules come back with a NULL definition.
        let rows = self
            .fetch(
                &format!("{}.{}", schema, view),
                r#"
                SELECT ISNULL(m.definition, '')
                FROM sys.views v
                JOIN sys.schemas s ON s.schema_id = v.schema_id
                LEFT JOIN sys.sql_modules m ON m.object_id = v.object_id
                WHERE s.name = @P1 AND v.name = @P2
                "#,
                &[schema, view],
            )
            .await?;

        Ok(rows.first().map(|row| ViewMeta {
            schema: schema.to_string(),
            name: view.to_string(),
            definition: text(row, 0),
        }))
    }

    async fn describe_routine(&self, schema: &str, routine: &str) -> Result<Option<RoutineMeta>> {
        let rows = self
            .fetch(
                &format!("{}.{}", schema, routine),
                r#"
                SELECT r.ROUTINE_TYPE, ISNULL(r.ROUTINE_BODY, 'SQL'), r.DATA_TYPE,
                       ISNULL(OBJECT_DEFINITION(OBJECT_ID(QUOTENAME(r.ROUTINE_SCHEMA) + '.' + QUOTENAME(r.ROUTINE_NAME))), '')
                FROM INFORMATION_SCHEMA.ROUTINES r
                WHERE r.ROUTINE_SCHEMA = @P1 AND r.ROUTINE_NAME = @P2
                "#,
                &[schema, routine],
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let kind = RoutineKind::parse(&text(row, 0));
        let return_type = match kind {
            RoutineKind::Function => Some(text(row, 2)).filter(|t| !t.is_empty()),
            RoutineKind::Procedure => None,
        };
        let meta = RoutineMeta {
            schema: schema.to_string(),
            name: routine.to_string(),
            kind,
            language: text(row, 1),
            return_type,
            parameters: Vec::new(),
            definition: text(row, 3),
        };

        Ok(Some(RoutineMeta {
            parameters: self.describe_parameters(schema, routine).await?,
            ..meta
        }))
    }
}
