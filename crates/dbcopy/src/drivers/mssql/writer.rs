//! SQL Server statement execution.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{ColumnData, FromSql};
use tracing::debug;

use super::reader::MssqlEndpoint;
use crate::core::traits::{Endpoint, EndpointInfo, QueryOutput, StatementExecutor};
use crate::error::{MigrateError, Result};

#[async_trait]
impl StatementExecutor for MssqlEndpoint {
    async fn execute(&self, sql: &str) -> Result<()> {
        let mut client = self.client().await?;
        client
            .simple_query(sql)
            .await
            .map_err(|e| MigrateError::execution(sql, e))?
            .into_results()
            .await
            .map_err(|e| MigrateError::execution(sql, e))?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<QueryOutput> {
        let mut client = self.client().await?;
        let rows = client
            .simple_query(sql)
            .await
            .map_err(|e| MigrateError::execution(sql, e))?
            .into_first_result()
            .await
            .map_err(|e| MigrateError::execution(sql, e))?;

        let mut output = QueryOutput::default();
        for row in rows {
            if output.columns.is_empty() {
                output.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            output.rows.push(row.into_iter().map(|data| cell_text(&data)).collect());
        }

        debug!("{}: query returned {} rows", self.info.name, output.rows.len());
        Ok(output)
    }
}

#[async_trait]
impl Endpoint for MssqlEndpoint {
    fn info(&self) -> &EndpointInfo {
        &self.info
    }

    async fn ping(&self) -> Result<()> {
        let mut client = self.client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(&self.info.name, e))?
            .into_row()
            .await
            .map_err(|e| MigrateError::connection(&self.info.name, e))?;
        Ok(())
    }

    async fn close(&self) {
        // bb8 closes idle connections when the pool is dropped.
        debug!(
            "{}: MSSQL pool released ({} connections open)",
            self.info.name,
            self.pool.state().connections
        );
    }
}

/// Render one cell as text; `None` is SQL NULL.
fn cell_text(data: &ColumnData<'static>) -> Option<String> {
    match data {
        ColumnData::U8(v) => v.map(|v| v.to_string()),
        ColumnData::I16(v) => v.map(|v| v.to_string()),
        ColumnData::I32(v) => v.map(|v| v.to_string()),
        ColumnData::I64(v) => v.map(|v| v.to_string()),
        ColumnData::F32(v) => v.map(|v| v.to_string()),
        ColumnData::F64(v) => v.map(|v| v.to_string()),
        ColumnData::Bit(v) => v.map(|v| if v { "1" } else { "0" }.to_string()),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()),
        ColumnData::Guid(v) => v.map(|g| g.to_string().to_uppercase()),
        ColumnData::Numeric(v) => v.map(|n| n.to_string()),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| format!("0x{}", hex::encode_upper(b.as_ref()))),
        other => temporal_text(other),
    }
}

fn temporal_text(data: &ColumnData<'static>) -> Option<String> {
    NaiveDateTime::from_sql(data)
        .ok()
        .flatten()
        .map(|v| v.to_string())
        .or_else(|| NaiveDate::from_sql(data).ok().flatten().map(|v| v.to_string()))
        .or_else(|| NaiveTime::from_sql(data).ok().flatten().map(|v| v.to_string()))
        .or_else(|| {
            DateTime::<FixedOffset>::from_sql(data)
                .ok()
                .flatten()
                .map(|v| v.to_string())
        })
        .or_else(|| <&str>::from_sql(data).ok().flatten().map(str::to_string))
}
