//! Transactions owned by a connection.
//!
//! Every operation names both the transaction and the connection it claims to own it.
//! The pair is checked under the registry lock before any native call is made.

pub mod savepoint;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bridge::Bridge;
use crate::error::{BridgeError, ResourceKind};
use crate::native::SqlExecutor;
use crate::registry::{Owned, ResourceId};
use crate::results::{QueryResult, TransactionStatus};
use crate::types::{RowValues, TransactionMode};

type SharedTransaction = Arc<Mutex<Option<libsql::Transaction>>>;

pub(crate) struct TransactionEntry {
    owner: ResourceId,
    mode: TransactionMode,
    /// Emptied by the terminal call.
    handle: SharedTransaction,
    /// Active savepoint names, innermost last.
    savepoints: Vec<String>,
}

impl Owned for TransactionEntry {
    fn owner(&self) -> &str {
        &self.owner
    }
}

impl TransactionEntry {
    /// Roll back a transaction whose owner went away.
    pub(crate) async fn abandon(self) -> Result<(), BridgeError> {
        finish(&self.handle, Finish::Rollback).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Finish {
    Commit,
    Rollback,
}

async fn finish(handle: &SharedTransaction, how: Finish) -> Result<(), BridgeError> {
    let txn = handle.lock().await.take();
    match (txn, how) {
        (Some(txn), Finish::Commit) => Ok(txn.commit().await?),
        (Some(txn), Finish::Rollback) => Ok(txn.rollback().await?),
        (None, _) => Ok(()),
    }
}

/// Run `op` against the open transaction behind `handle`.
pub(crate) async fn with_open<T>(
    txn_id: &str,
    handle: &SharedTransaction,
    op: impl AsyncFnOnce(&libsql::Transaction) -> Result<T, BridgeError>,
) -> Result<T, BridgeError> {
    let guard = handle.lock().await;
    let txn = guard
        .as_ref()
        .ok_or_else(|| BridgeError::not_found(ResourceKind::Transaction, txn_id))?;
    op(txn).await
}

impl Bridge {
    /// Ownership-checked handle to an open transaction.
    pub(crate) fn owned_transaction(
        &self,
        txn_id: &str,
        conn_id: &str,
    ) -> Result<SharedTransaction, BridgeError> {
        self.transactions
            .with_owned(txn_id, conn_id, |entry| Arc::clone(&entry.handle))
    }

    /// Begin a deferred transaction.
    ///
    /// # Errors
    /// `NotFound` for unknown connections, `Native` if the engine refuses.
    pub fn begin(&self, conn_id: &str) -> Result<ResourceId, BridgeError> {
        self.begin_with_mode(conn_id, TransactionMode::Deferred)
    }

    /// # Errors
    /// `NotFound` for unknown connections, `Native` if the engine refuses (for example a
    /// transaction is already open on the connection).
    pub fn begin_with_mode(
        &self,
        conn_id: &str,
        mode: TransactionMode,
    ) -> Result<ResourceId, BridgeError> {
        let conn = self.connection(conn_id)?.conn;
        let txn = self.run(async move {
            Ok(conn.transaction_with_behavior(mode.behavior()).await?)
        })?;
        let txn_id = self.adopt(
            &self.transactions,
            TransactionEntry {
                owner: conn_id.to_string(),
                mode,
                handle: Arc::new(Mutex::new(Some(txn))),
                savepoints: Vec::new(),
            },
        )?;
        debug!(conn_id, %txn_id, ?mode, "transaction started");
        Ok(txn_id)
    }

    /// Run a command inside the transaction and return the affected-row count.
    ///
    /// # Errors
    /// `NotOwner` if `conn_id` does not own the transaction, `NotFound`, or `Native`.
    pub fn execute_in_transaction(
        &self,
        txn_id: &str,
        conn_id: &str,
        sql: &str,
        params: &[RowValues],
    ) -> Result<u64, BridgeError> {
        let handle = self.owned_transaction(txn_id, conn_id)?;
        self.run(async move {
            with_open(txn_id, &handle, async |txn| txn.execute_dml(sql, params).await).await
        })
    }

    /// Run a statement inside the transaction, routed to the query or execute path.
    ///
    /// # Errors
    /// `NotOwner` if `conn_id` does not own the transaction, `NotFound`, or `Native`.
    pub fn query_in_transaction(
        &self,
        txn_id: &str,
        conn_id: &str,
        sql: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, BridgeError> {
        let handle = self.owned_transaction(txn_id, conn_id)?;
        self.run(async move {
            with_open(txn_id, &handle, async |txn| txn.execute_routed(sql, params).await).await
        })
    }

    /// Commit. The transaction id is released whether or not the commit succeeds.
    ///
    /// # Errors
    /// `NotOwner` (the transaction stays open), `NotFound`, or `Native`.
    pub fn commit(&self, txn_id: &str, conn_id: &str) -> Result<(), BridgeError> {
        self.finish(txn_id, conn_id, Finish::Commit)
    }

    /// Roll back. The transaction id is released whether or not the rollback succeeds.
    ///
    /// # Errors
    /// `NotOwner` (the transaction stays open), `NotFound`, or `Native`.
    pub fn rollback(&self, txn_id: &str, conn_id: &str) -> Result<(), BridgeError> {
        self.finish(txn_id, conn_id, Finish::Rollback)
    }

    fn finish(&self, txn_id: &str, conn_id: &str, how: Finish) -> Result<(), BridgeError> {
        let entry = self.transactions.take_owned(txn_id, conn_id)?;
        debug!(conn_id, txn_id, ?how, "transaction finished");
        self.run(async move { finish(&entry.handle, how).await })
    }

    /// Mode, open savepoints and the connection's autocommit flag.
    ///
    /// # Errors
    /// `NotOwner`, `NotFound`.
    pub fn transaction_status(
        &self,
        txn_id: &str,
        conn_id: &str,
    ) -> Result<TransactionStatus, BridgeError> {
        let (mode, savepoints) = self.transactions.with_owned(txn_id, conn_id, |entry| {
            (entry.mode, entry.savepoints.clone())
        })?;
        let is_autocommit = self.is_autocommit(conn_id)?;
        Ok(TransactionStatus {
            mode,
            savepoints,
            is_autocommit,
        })
    }
}
