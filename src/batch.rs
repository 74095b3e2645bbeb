use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::native::SqlExecutor;
use crate::native::rows::collect_rows;
use crate::results::QueryResult;
use crate::types::{QueryAndParams, TransactionMode};

impl Bridge {
    /// Run every statement on its own. A failure does not stop the ones after it; the
    /// result list has one entry per statement, in order.
    ///
    /// # Errors
    /// Only for an unknown connection. Per-statement failures are in the returned list.
    pub fn batch(
        &self,
        conn_id: &str,
        statements: &[QueryAndParams],
    ) -> Result<Vec<Result<QueryResult, BridgeError>>, BridgeError> {
        let conn = self.connection(conn_id)?.conn;
        self.run(async move {
            let mut results = Vec::with_capacity(statements.len());
            for item in statements {
                results.push(conn.execute_routed(&item.query, &item.params).await);
            }
            Ok(results)
        })
    }

    /// Run every statement inside one transaction. Either all of them take effect or,
    /// after the first failure, the transaction is rolled back before the error is
    /// returned.
    ///
    /// # Errors
    /// `NotFound` for an unknown connection, `BatchStatement` naming the failing index, or
    /// `Native` if the transaction itself cannot begin or commit.
    pub fn batch_atomic(
        &self,
        conn_id: &str,
        statements: &[QueryAndParams],
    ) -> Result<Vec<QueryResult>, BridgeError> {
        let conn = self.connection(conn_id)?.conn;
        self.run(async move {
            let txn = conn
                .transaction_with_behavior(TransactionMode::Deferred.behavior())
                .await?;
            let mut results = Vec::with_capacity(statements.len());
            for (index, item) in statements.iter().enumerate() {
                let outcome = txn.execute_routed(&item.query, &item.params).await;
                match outcome {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        if let Err(rollback_err) = txn.rollback().await {
                            warn!(conn_id, error = %rollback_err, "atomic batch rollback failed");
                        }
                        debug!(conn_id, index, "atomic batch rolled back");
                        return Err(BridgeError::BatchStatement {
                            index,
                            source: Box::new(err),
                        });
                    }
                }
            }
            txn.commit().await?;
            Ok(results)
        })
    }

    /// Run a script of `;`-separated statements through the native batch call. Stops at
    /// the first failing statement; the ones before it keep their effects.
    ///
    /// One entry per statement that produced rows or was skipped; `None` for statements
    /// that returned no rows.
    ///
    /// # Errors
    /// `NotFound` for unknown connections, `Native` for the first failing statement.
    pub fn batch_sql(
        &self,
        conn_id: &str,
        sql: &str,
    ) -> Result<Vec<Option<QueryResult>>, BridgeError> {
        let conn = self.connection(conn_id)?.conn;
        let results = self.run(async move { collect_batch(conn.execute_batch(sql).await?).await })?;
        debug!(conn_id, statements = results.len(), "sql batch executed");
        Ok(results)
    }

    /// [`Bridge::batch_sql`] wrapped in a native transaction: all statements apply or none
    /// do. `BEGIN`, `COMMIT`, `ROLLBACK` and `END` inside the script are refused. Local
    /// databases report no per-statement rows, so the list is empty for them.
    ///
    /// # Errors
    /// `NotFound` for unknown connections, `Native` if any statement fails.
    pub fn batch_sql_atomic(
        &self,
        conn_id: &str,
        sql: &str,
    ) -> Result<Vec<Option<QueryResult>>, BridgeError> {
        let conn = self.connection(conn_id)?.conn;
        let results = self.run(async move {
            collect_batch(conn.execute_transactional_batch(sql).await?).await
        })?;
        debug!(conn_id, "atomic sql batch committed");
        Ok(results)
    }
}

async fn collect_batch(
    mut batch: libsql::BatchRows,
) -> Result<Vec<Option<QueryResult>>, BridgeError> {
    let mut results = Vec::new();
    while let Some(statement) = batch.next_stmt_row() {
        results.push(match statement {
            Some(rows) => Some(collect_rows(rows).await?),
            None => None,
        });
    }
    Ok(results)
}
