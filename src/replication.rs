//! Replica frame tracking for read-your-writes.
//!
//! After writing through one connection, read [`Bridge::max_write_frame`] there and pass it
//! to [`Bridge::sync_until`] on any replica connection before reading from it. Connections
//! that are not replicas report frame 0 and treat waits as already satisfied.

use std::sync::Arc;

use libsql::Database;
use tracing::debug;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::runtime::with_timeout;
use crate::types::ConnectionMode;

impl Bridge {
    /// The database handle, but only for replica connections.
    fn replica(&self, conn_id: &str) -> Result<Option<Arc<Database>>, BridgeError> {
        self.connections.with_entry(conn_id, |entry| {
            (entry.mode == ConnectionMode::Replica).then(|| Arc::clone(&entry.db))
        })
    }

    /// Frame the replica has replayed up to.
    ///
    /// # Errors
    /// `NotFound`, `Native`.
    pub fn current_frame(&self, conn_id: &str) -> Result<u64, BridgeError> {
        let Some(db) = self.replica(conn_id)? else {
            return Ok(0);
        };
        self.run(async move { Ok(db.replication_index().await?.unwrap_or(0)) })
    }

    /// Highest frame produced by writes through this database. Reads an in-memory
    /// counter, so it never enters the async runtime.
    ///
    /// # Errors
    /// `NotFound`.
    pub fn max_write_frame(&self, conn_id: &str) -> Result<u64, BridgeError> {
        let Some(db) = self.replica(conn_id)? else {
            return Ok(0);
        };
        self.run_fast(|| Ok(db.max_write_replication_index().unwrap_or(0)))
    }

    /// Wait until the replica has replayed `frame`, bounded by the sync timeout.
    ///
    /// # Errors
    /// `NotFound`, `Timeout`, `Native`.
    pub fn sync_until(&self, conn_id: &str, frame: u64) -> Result<(), BridgeError> {
        let Some(db) = self.replica(conn_id)? else {
            return Ok(());
        };
        let timeout = self.config.sync_timeout;
        self.run(with_timeout("sync_until", timeout, async move {
            db.sync_until(frame).await?;
            Ok(())
        }))?;
        debug!(conn_id, frame, "replica caught up");
        Ok(())
    }

    /// Push pending local writes upstream; returns the resulting frame.
    ///
    /// # Errors
    /// `NotFound`, `Timeout`, `Native`.
    pub fn flush(&self, conn_id: &str) -> Result<u64, BridgeError> {
        let Some(db) = self.replica(conn_id)? else {
            return Ok(0);
        };
        let timeout = self.config.sync_timeout;
        self.run(with_timeout("flush", timeout, async move {
            Ok(db.flush_replicator().await?.unwrap_or(0))
        }))
    }

    /// Pull everything the primary has.
    ///
    /// # Errors
    /// `NotFound`, `Timeout`, `Native`.
    pub fn sync(&self, conn_id: &str) -> Result<(), BridgeError> {
        let Some(db) = self.replica(conn_id)? else {
            return Ok(());
        };
        let timeout = self.config.sync_timeout;
        self.run(with_timeout("sync", timeout, async move {
            db.sync().await?;
            Ok(())
        }))
    }
}
