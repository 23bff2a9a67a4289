//! PostgreSQL statement execution.
//!
//! DDL runs over the simple query protocol so that multi-statement bodies
//! (dollar-quoted routines, `DROP ...; CREATE ...`) go through unchanged.

use async_trait::async_trait;
use tokio_postgres::SimpleQueryMessage;
use tracing::debug;

use super::reader::PostgresEndpoint;
use crate::core::traits::{Endpoint, EndpointInfo, QueryOutput, StatementExecutor};
use crate::error::{MigrateError, Result};

#[async_trait]
impl StatementExecutor for PostgresEndpoint {
    async fn execute(&self, sql: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| MigrateError::execution(sql, e))
    }

    async fn query(&self, sql: &str) -> Result<QueryOutput> {
        let client = self.client().await?;
        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| MigrateError::execution(sql, e))?;

        let mut output = QueryOutput::default();
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => {
                    // Only the first result set is reported.
                    if output.columns.is_empty() {
                        output.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    } else if row.columns().len() != output.columns.len() {
                        break;
                    }
                    let values = (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect();
                    output.rows.push(values);
                }
                SimpleQueryMessage::CommandComplete(_) if !output.rows.is_empty() => break,
                _ => {}
            }
        }

        debug!("{}: query returned {} rows", self.info.name, output.rows.len());
        Ok(output)
    }
}

#[async_trait]
impl Endpoint for PostgresEndpoint {
    fn info(&self) -> &EndpointInfo {
        &self.info
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(&self.info.name, e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
        debug!("{}: PostgreSQL pool closed", self.info.name);
    }
}
