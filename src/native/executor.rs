use async_trait::async_trait;

use crate::error::BridgeError;
use crate::native::params::Params;
use crate::native::rows::collect_rows;
use crate::results::QueryResult;
use crate::routing::{StatementKind, classify, detect_query_type};
use crate::types::RowValues;

/// Anything that can run SQL on a native connection: the connection itself or an open
/// transaction on it.
#[async_trait(?Send)]
pub(crate) trait SqlExecutor {
    /// Run a statement that produces rows and drain them.
    async fn execute_select(
        &self,
        query: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, BridgeError>;

    /// Run a command and return the number of rows affected.
    async fn execute_dml(&self, query: &str, params: &[RowValues]) -> Result<u64, BridgeError>;

    /// Dispatch by [`classify`]: row-producing statements go through the query path, the
    /// rest through the execute path.
    async fn execute_routed(
        &self,
        query: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, BridgeError> {
        let kind = classify(query);
        tracing::trace!(query_type = ?detect_query_type(query), ?kind, "routing statement");
        match kind {
            StatementKind::Rows => self.execute_select(query, params).await,
            StatementKind::RowCount => self
                .execute_dml(query, params)
                .await
                .map(QueryResult::affected),
        }
    }
}

#[async_trait(?Send)]
impl SqlExecutor for libsql::Connection {
    async fn execute_select(
        &self,
        query: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, BridgeError> {
        let rows = self.query(query, Params::convert(params).into_vec()).await?;
        collect_rows(rows).await
    }

    async fn execute_dml(&self, query: &str, params: &[RowValues]) -> Result<u64, BridgeError> {
        let affected = self
            .execute(query, Params::convert(params).into_vec())
            .await?;
        Ok(affected)
    }
}

#[async_trait(?Send)]
impl SqlExecutor for libsql::Transaction {
    async fn execute_select(
        &self,
        query: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, BridgeError> {
        let conn: &libsql::Connection = self;
        conn.execute_select(query, params).await
    }

    async fn execute_dml(&self, query: &str, params: &[RowValues]) -> Result<u64, BridgeError> {
        let conn: &libsql::Connection = self;
        conn.execute_dml(query, params).await
    }
}
