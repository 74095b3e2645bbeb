//! Compiled statements cached per connection.
//!
//! The native statement sits behind a `tokio::sync::Mutex` so it can be reused across
//! awaited calls. Each execution rewinds the statement, binds every parameter position
//! (unsupplied trailing ones as NULL) and rewinds again afterwards, so a cached statement
//! behaves like a freshly prepared one.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::native::Params;
use crate::native::rows::collect_rows;
use crate::registry::{Owned, ResourceId};
use crate::results::{ColumnInfo, QueryResult, StatementInfo};
use crate::types::RowValues;

pub(crate) struct StatementEntry {
    owner: ResourceId,
    statement: Arc<Mutex<libsql::Statement>>,
    info: Arc<StatementInfo>,
}

impl Owned for StatementEntry {
    fn owner(&self) -> &str {
        &self.owner
    }
}

fn describe(sql: &str, statement: &libsql::Statement) -> StatementInfo {
    let parameter_count = statement.parameter_count();
    let parameter_names = (1..=parameter_count)
        .map(|idx| {
            i32::try_from(idx)
                .ok()
                .and_then(|idx| statement.parameter_name(idx))
                .map(ToString::to_string)
        })
        .collect();
    let columns = statement
        .columns()
        .iter()
        .map(|col| {
            let name = col.name().to_string();
            ColumnInfo {
                origin_name: col.origin_name().map_or_else(|| name.clone(), ToString::to_string),
                decl_type: col.decl_type().map(ToString::to_string),
                name,
            }
        })
        .collect();
    StatementInfo {
        sql: sql.to_string(),
        parameter_count,
        parameter_names,
        columns,
    }
}

impl Bridge {
    /// The cached statement and its parameter count.
    fn owned_statement(
        &self,
        stmt_id: &str,
        conn_id: &str,
    ) -> Result<(Arc<Mutex<libsql::Statement>>, usize), BridgeError> {
        self.statements.with_owned(stmt_id, conn_id, |entry| {
            (Arc::clone(&entry.statement), entry.info.parameter_count)
        })
    }

    /// Compile `sql` now so syntax errors surface here rather than on first use.
    ///
    /// # Errors
    /// `NotFound` for unknown connections, `Native` for compile errors.
    pub fn prepare(&self, conn_id: &str, sql: &str) -> Result<ResourceId, BridgeError> {
        let conn = self.connection(conn_id)?.conn;
        let statement = self.run(async move { Ok(conn.prepare(sql).await?) })?;
        let info = describe(sql, &statement);
        let stmt_id = self.adopt(
            &self.statements,
            StatementEntry {
                owner: conn_id.to_string(),
                statement: Arc::new(Mutex::new(statement)),
                info: Arc::new(info),
            },
        )?;
        debug!(conn_id, %stmt_id, "statement prepared");
        Ok(stmt_id)
    }

    /// Execute the cached statement as a command and return the affected-row count.
    ///
    /// # Errors
    /// `NotOwner`, `NotFound`, or `Native`.
    pub fn execute_statement(
        &self,
        stmt_id: &str,
        conn_id: &str,
        params: &[RowValues],
    ) -> Result<u64, BridgeError> {
        let (statement, parameter_count) = self.owned_statement(stmt_id, conn_id)?;
        let params = Params::convert(params).padded_to(parameter_count);
        self.run(async move {
            let stmt = statement.lock().await;
            stmt.reset();
            let affected = stmt.execute(params.into_vec()).await;
            stmt.reset();
            let affected = u64::try_from(affected?).map_err(|e| {
                BridgeError::Internal(format!("affected rows conversion error: {e}"))
            })?;
            Ok(affected)
        })
    }

    /// Run the cached statement as a query and collect its rows.
    ///
    /// # Errors
    /// `NotOwner`, `NotFound`, or `Native`.
    pub fn query_statement(
        &self,
        stmt_id: &str,
        conn_id: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, BridgeError> {
        let (statement, parameter_count) = self.owned_statement(stmt_id, conn_id)?;
        let params = Params::convert(params).padded_to(parameter_count);
        self.run(async move {
            let stmt = statement.lock().await;
            stmt.reset();
            let result = match stmt.query(params.into_vec()).await {
                Ok(rows) => collect_rows(rows).await,
                Err(err) => Err(err.into()),
            };
            stmt.reset();
            result
        })
    }

    /// Parameter and column metadata captured at prepare time. Never touches the engine.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn introspect(&self, stmt_id: &str) -> Result<StatementInfo, BridgeError> {
        self.statements
            .with_entry(stmt_id, |entry| StatementInfo::clone(&entry.info))
    }

    /// Clear bindings and rewind the statement.
    ///
    /// # Errors
    /// `NotOwner`, `NotFound`.
    pub fn reset_statement(&self, stmt_id: &str, conn_id: &str) -> Result<(), BridgeError> {
        let (statement, _) = self.owned_statement(stmt_id, conn_id)?;
        self.run(async move {
            statement.lock().await.reset();
            Ok(())
        })
    }

    /// Release the compiled statement. Unknown ids are a no-op.
    ///
    /// # Errors
    /// `Internal` if the registry lock is poisoned.
    pub fn close_statement(&self, stmt_id: &str) -> Result<(), BridgeError> {
        if self.statements.remove(stmt_id)?.is_some() {
            debug!(stmt_id, "statement closed");
        }
        Ok(())
    }
}
