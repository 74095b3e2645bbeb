use std::future::Future;

use lazy_static::lazy_static;
use serde::Serialize;

use crate::config::BridgeConfig;
use crate::connection::ConnectionEntry;
use crate::cursor::CursorEntry;
use crate::error::{BridgeError, ResourceKind};
use crate::registry::{Owned, Registry, ResourceId};
use crate::runtime::{BridgeRuntime, guard};
use crate::statement::StatementEntry;
use crate::transaction::TransactionEntry;

lazy_static! {
    static ref GLOBAL: Result<Bridge, BridgeError> = Bridge::new(BridgeConfig::default());
}

/// Synchronous, handle-based front door to the libsql client.
///
/// A `Bridge` owns four independently locked registries (connections, transactions,
/// statements, cursors) and a private tokio runtime. Every method may be called from any
/// number of host threads at once. Methods block the calling thread until the native work
/// completes; none of them may be called from inside an async task.
///
/// ```rust,no_run
/// use libsql_bridge::prelude::*;
///
/// # fn main() -> Result<(), BridgeError> {
/// let bridge = Bridge::new(BridgeConfig::default())?;
/// let conn = bridge.connect(ConnectOptions::local("app.db"))?;
/// bridge.query_args(&conn, "CREATE TABLE IF NOT EXISTS t (v INTEGER)", &[])?;
///
/// let txn = bridge.begin(&conn)?;
/// bridge.execute_in_transaction(&txn, &conn, "INSERT INTO t VALUES (?1)", &[RowValues::Int(1)])?;
/// bridge.commit(&txn, &conn)?;
/// bridge.close(&conn)?;
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    pub(crate) config: BridgeConfig,
    runtime: BridgeRuntime,
    pub(crate) connections: Registry<ConnectionEntry>,
    pub(crate) transactions: Registry<TransactionEntry>,
    pub(crate) statements: Registry<StatementEntry>,
    pub(crate) cursors: Registry<CursorEntry>,
}

/// Live resource counts, one per registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceCounts {
    pub connections: usize,
    pub transactions: usize,
    pub statements: usize,
    pub cursors: usize,
}

impl Bridge {
    /// # Errors
    /// [`BridgeError::Internal`] if the runtime cannot be started.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let runtime = BridgeRuntime::new(&config)?;
        Ok(Self {
            config,
            runtime,
            connections: Registry::new(ResourceKind::Connection),
            transactions: Registry::new(ResourceKind::Transaction),
            statements: Registry::new(ResourceKind::Statement),
            cursors: Registry::new(ResourceKind::Cursor),
        })
    }

    /// Process-wide bridge with default settings, created on first use.
    ///
    /// # Errors
    /// The construction error, if the runtime could not be started.
    pub fn global() -> Result<&'static Bridge, BridgeError> {
        GLOBAL.as_ref().map_err(Clone::clone)
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// # Errors
    /// [`BridgeError::Internal`] if a registry lock is poisoned.
    pub fn resource_counts(&self) -> Result<ResourceCounts, BridgeError> {
        Ok(ResourceCounts {
            connections: self.connections.len()?,
            transactions: self.transactions.len()?,
            statements: self.statements.len()?,
            cursors: self.cursors.len()?,
        })
    }

    /// Block on native work from a host thread.
    pub(crate) fn run<T>(
        &self,
        fut: impl Future<Output = Result<T, BridgeError>>,
    ) -> Result<T, BridgeError> {
        self.runtime.block_on(fut)
    }

    /// Run a fast synchronous native call off the runtime, panics converted to errors.
    pub(crate) fn run_fast<T>(
        &self,
        f: impl FnOnce() -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        guard(f)
    }

    /// Register a resource owned by a connection. If the connection was closed while the
    /// resource was being created, the entry is withdrawn again so nothing outlives it.
    pub(crate) fn adopt<T: Owned>(
        &self,
        registry: &Registry<T>,
        entry: T,
    ) -> Result<ResourceId, BridgeError> {
        let owner = entry.owner().to_string();
        let id = registry.insert(entry)?;
        if self.connections.contains(&owner)? {
            Ok(id)
        } else {
            let _orphan = registry.remove(&id)?;
            Err(BridgeError::not_found(ResourceKind::Connection, owner))
        }
    }

    /// Poison one registry's lock, as a panic while holding it would.
    #[cfg(feature = "fault-injection")]
    pub fn poison_registry(&self, kind: ResourceKind) {
        match kind {
            ResourceKind::Connection => self.connections.poison(),
            ResourceKind::Transaction | ResourceKind::Savepoint => self.transactions.poison(),
            ResourceKind::Statement => self.statements.poison(),
            ResourceKind::Cursor => self.cursors.poison(),
        }
    }
}
