//! Opening, closing and probing native connections.

pub mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database};
use serde::Serialize;
use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::native::SqlExecutor;
use crate::registry::ResourceId;
use crate::results::{ConnectionHealth, QueryResult};
use crate::runtime::with_timeout;
use crate::types::{ConnectionMode, RowValues, SyncPolicy};

pub use config::{ConnectOptions, ConnectOptionsBuilder};

/// A registered native connection. Cloning is cheap: the database is reference counted
/// and `libsql::Connection` is a shared handle.
#[derive(Clone)]
pub(crate) struct ConnectionEntry {
    pub(crate) mode: ConnectionMode,
    pub(crate) sync_policy: SyncPolicy,
    pub(crate) db: Arc<Database>,
    pub(crate) conn: Connection,
    busy_timeout: Option<Duration>,
    opened_at: DateTime<Utc>,
}

/// Cached facts about a connection; reading them never touches the native client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub mode: ConnectionMode,
    pub sync_policy: SyncPolicy,
    pub busy_timeout_ms: Option<u64>,
    pub opened_at: DateTime<Utc>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, BridgeError> {
    value
        .as_deref()
        .ok_or_else(|| BridgeError::InvalidOptions(format!("missing `{field}`")))
}

async fn open(
    options: &ConnectOptions,
    sync_timeout: Duration,
) -> Result<ConnectionEntry, BridgeError> {
    let db = match options.mode {
        ConnectionMode::Local => Builder::new_local(required(&options.database, "database")?)
            .build()
            .await?,
        ConnectionMode::Remote => Builder::new_remote(
            required(&options.uri, "uri")?.to_string(),
            required(&options.auth_token, "auth_token")?.to_string(),
        )
        .build()
        .await?,
        ConnectionMode::Replica => Builder::new_remote_replica(
            required(&options.database, "database")?,
            required(&options.uri, "uri")?.to_string(),
            required(&options.auth_token, "auth_token")?.to_string(),
        )
        .build()
        .await?,
    };
    let conn = db.connect()?;

    if options.mode != ConnectionMode::Local {
        conn.query("SELECT 1", ()).await?;
    }
    if options.mode == ConnectionMode::Replica && options.sync_policy == SyncPolicy::Enabled {
        with_timeout("sync", sync_timeout, async {
            db.sync().await?;
            Ok(())
        })
        .await?;
    }
    if let Some(timeout) = options.busy_timeout {
        conn.busy_timeout(timeout)?;
    }

    Ok(ConnectionEntry {
        mode: options.mode,
        sync_policy: options.sync_policy,
        db: Arc::new(db),
        conn,
        busy_timeout: options.busy_timeout,
        opened_at: Utc::now(),
    })
}

impl Bridge {
    pub(crate) fn connection(&self, conn_id: &str) -> Result<ConnectionEntry, BridgeError> {
        self.connections.with_entry(conn_id, Clone::clone)
    }

    fn native_connection(&self, conn_id: &str) -> Result<Connection, BridgeError> {
        self.connections.with_entry(conn_id, |entry| entry.conn.clone())
    }

    /// Open a connection and return its id.
    ///
    /// The whole attempt, including the liveness probe for remote modes and the initial
    /// sync of replicas, is bounded by the configured connect timeout.
    ///
    /// # Errors
    /// `InvalidOptions` before any native call, `Native` or `Timeout` from opening.
    pub fn connect(&self, options: ConnectOptions) -> Result<ResourceId, BridgeError> {
        options.validate()?;
        let connect_timeout = self.config.connect_timeout;
        let sync_timeout = self.config.sync_timeout;
        let entry = self.run(with_timeout(
            "connect",
            connect_timeout,
            open(&options, sync_timeout),
        ))?;
        let id = self.connections.insert(entry)?;
        debug!(conn_id = %id, mode = ?options.mode, "connection opened");
        Ok(id)
    }

    /// Close a connection together with every transaction, statement and cursor it owns.
    ///
    /// The connection is unregistered first so nothing new can attach to it. Open
    /// transactions are rolled back on a best-effort basis. Unknown ids are a no-op.
    ///
    /// # Errors
    /// `Internal` if a registry lock is poisoned.
    pub fn close(&self, conn_id: &str) -> Result<(), BridgeError> {
        let Some(entry) = self.connections.remove(conn_id)? else {
            return Ok(());
        };
        let cursors = self.cursors.remove_owned_by(conn_id)?;
        let statements = self.statements.remove_owned_by(conn_id)?;
        let transactions = self.transactions.remove_owned_by(conn_id)?;
        debug!(
            conn_id,
            cursors = cursors.len(),
            statements = statements.len(),
            transactions = transactions.len(),
            "closing connection"
        );
        drop(cursors);
        drop(statements);

        if !transactions.is_empty() {
            self.run(async move {
                for (txn_id, txn) in transactions {
                    if let Err(err) = txn.abandon().await {
                        warn!(conn_id, %txn_id, error = %err, "rollback during close failed");
                    }
                }
                Ok(())
            })?;
        }
        drop(entry);
        Ok(())
    }

    /// No-op round trip. A dead connection is reported as
    /// [`ConnectionHealth::Disconnected`], not as an error.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn ping(&self, conn_id: &str) -> Result<ConnectionHealth, BridgeError> {
        let conn = self.native_connection(conn_id)?;
        let timeout = self.config.connect_timeout;
        self.run(async move {
            let probe = with_timeout("ping", timeout, async {
                let mut rows = conn.query("SELECT 1", ()).await?;
                rows.next().await?;
                Ok(())
            })
            .await;
            Ok(match probe {
                Ok(()) => ConnectionHealth::Alive,
                Err(err) => ConnectionHealth::Disconnected {
                    reason: err.to_string(),
                },
            })
        })
    }

    /// Run one statement, routed to the query or execute path.
    ///
    /// # Errors
    /// `NotFound` for unknown connections, `Native` for engine failures.
    pub fn query_args(
        &self,
        conn_id: &str,
        sql: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run(async move { conn.execute_routed(sql, params).await })
    }

    /// Abort whatever is running on the connection. Safe to call from any thread while
    /// another thread is blocked on the same connection.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Native` if the engine refuses.
    pub fn interrupt(&self, conn_id: &str) -> Result<(), BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run_fast(|| Ok(conn.interrupt()?))
    }

    /// How long the engine waits on a locked database before giving up.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Native` if the engine refuses.
    pub fn set_busy_timeout(&self, conn_id: &str, timeout_ms: u64) -> Result<(), BridgeError> {
        let timeout = Duration::from_millis(timeout_ms);
        let conn = self.native_connection(conn_id)?;
        self.run_fast(|| Ok(conn.busy_timeout(timeout)?))?;
        self.connections
            .with_entry_mut(conn_id, |entry| entry.busy_timeout = Some(timeout))
    }

    /// Return the connection to a clean state.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn reset_connection(&self, conn_id: &str) -> Result<(), BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run(async move {
            conn.reset().await;
            Ok(())
        })
    }

    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn connection_info(&self, conn_id: &str) -> Result<ConnectionInfo, BridgeError> {
        self.connections.with_entry(conn_id, |entry| ConnectionInfo {
            mode: entry.mode,
            sync_policy: entry.sync_policy,
            busy_timeout_ms: entry
                .busy_timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            opened_at: entry.opened_at,
        })
    }

    /// Rowid of the most recent successful insert on this connection.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn last_insert_rowid(&self, conn_id: &str) -> Result<i64, BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run_fast(|| Ok(conn.last_insert_rowid()))
    }

    /// Rows changed by the most recent statement.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn changes(&self, conn_id: &str) -> Result<u64, BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run_fast(|| Ok(conn.changes()))
    }

    /// Rows changed since the connection was opened.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn total_changes(&self, conn_id: &str) -> Result<u64, BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run_fast(|| Ok(conn.total_changes()))
    }

    /// Allow or forbid loading extensions, through both [`Bridge::load_extension`] and the
    /// SQL `load_extension()` function. Off when a connection opens.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Native` if the engine refuses (remote connections).
    pub fn enable_load_extension(&self, conn_id: &str, enabled: bool) -> Result<(), BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run_fast(|| {
            if enabled {
                conn.load_extension_enable()?;
            } else {
                conn.load_extension_disable()?;
            }
            Ok(())
        })?;
        debug!(conn_id, enabled, "extension loading toggled");
        Ok(())
    }

    /// Load a shared-library extension, optionally naming its entry point. Loading must
    /// have been enabled with [`Bridge::enable_load_extension`].
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Native` if loading is disabled or the library fails.
    pub fn load_extension(
        &self,
        conn_id: &str,
        path: impl AsRef<Path>,
        entry_point: Option<&str>,
    ) -> Result<(), BridgeError> {
        let conn = self.native_connection(conn_id)?;
        let path = path.as_ref();
        self.run_fast(|| Ok(conn.load_extension(path, entry_point)?))?;
        debug!(conn_id, path = %path.display(), "extension loaded");
        Ok(())
    }

    /// False while a transaction is open on the connection.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn is_autocommit(&self, conn_id: &str) -> Result<bool, BridgeError> {
        let conn = self.native_connection(conn_id)?;
        self.run_fast(|| Ok(conn.is_autocommit()))
    }
}
