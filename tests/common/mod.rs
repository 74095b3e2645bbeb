#![allow(dead_code)]

use std::path::Path;

use libsql_bridge::prelude::*;
use tempfile::TempDir;

/// A bridge with a small runtime plus a scratch directory for database files.
pub struct Harness {
    pub bridge: Bridge,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = BridgeConfig::builder().worker_threads(2).finish();
        Ok(Self {
            bridge: Bridge::new(config)?,
            dir: tempfile::tempdir()?,
        })
    }

    pub fn db_path(&self, name: &str) -> String {
        path_string(&self.dir.path().join(name))
    }

    /// Open `name` in the scratch directory.
    pub fn open(&self, name: &str) -> Result<ResourceId, BridgeError> {
        self.bridge.connect(ConnectOptions::local(self.db_path(name)))
    }

    /// Open `name` and create table `t (id INTEGER PRIMARY KEY, name TEXT)`.
    pub fn open_with_table(&self, name: &str) -> Result<ResourceId, BridgeError> {
        let conn = self.open(name)?;
        self.bridge.query_args(
            &conn,
            "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, name TEXT)",
            &[],
        )?;
        Ok(conn)
    }

    pub fn count(&self, conn: &str, table: &str) -> Result<i64, BridgeError> {
        let result = self
            .bridge
            .query_args(conn, &format!("SELECT count(*) AS n FROM {table}"), &[])?;
        Ok(result
            .get(0, "n")
            .and_then(RowValues::as_int)
            .copied()
            .unwrap_or(-1))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
