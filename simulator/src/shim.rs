use libsql_bridge::prelude::*;
use tempfile::TempDir;

use crate::args::SimConfig;
use crate::model::{Foreign, Op, TaskState};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS items (id INTEGER PRIMARY KEY, task INTEGER, note TEXT)";
const INSERT: &str = "INSERT INTO items (task, note) VALUES (?1, ?2)";
const COUNT: &str = "SELECT count(*) AS n FROM items";
const SCAN: &str = "SELECT id, note FROM items ORDER BY id";

#[derive(Debug, Clone)]
pub(crate) struct StepOutcome {
    pub(crate) result: Result<(), BridgeError>,
    pub(crate) conn: Option<ResourceId>,
}

impl StepOutcome {
    fn of(task: &TaskState, result: Result<(), BridgeError>) -> Self {
        Self {
            result,
            conn: task.conn.clone(),
        }
    }
}

/// Applies model operations to a real [`Bridge`] and keeps the model in step with what
/// the bridge reports. `Err(String)` means the bridge broke a contract.
pub(crate) struct BridgeShim {
    pub(crate) bridge: Bridge,
    dir: TempDir,
    fetch_size: usize,
    txn_mode: TransactionMode,
}

impl BridgeShim {
    pub(crate) fn new(config: &SimConfig) -> Result<Self, String> {
        let bridge_config = BridgeConfig::builder()
            .worker_threads(2)
            .default_fetch_size(config.fetch_size)
            .finish();
        Ok(Self {
            bridge: Bridge::new(bridge_config).map_err(|e| e.to_string())?,
            dir: tempfile::tempdir().map_err(|e| e.to_string())?,
            fetch_size: config.fetch_size,
            txn_mode: config.txn_mode,
        })
    }

    pub(crate) fn apply(&self, task: &mut TaskState, op: Op) -> Result<StepOutcome, String> {
        let result = match op {
            Op::Sleep(_) => Ok(()),
            Op::Connect => self.connect(task),
            Op::Close => self.close(task),
            Op::Begin => self.begin(task),
            Op::Commit => self.finish(task, true),
            Op::Rollback => self.finish(task, false),
            Op::Insert => self.insert(task),
            Op::Count => self.count(task),
            Op::Savepoint => self.savepoint(task),
            Op::ReleaseSavepoint(idx) => self.unwind(task, idx, false),
            Op::RollbackToSavepoint(idx) => self.unwind(task, idx, true),
            Op::Prepare => self.prepare(task),
            Op::RunPrepared(idx) => self.run_prepared(task, idx),
            Op::DeclareCursor => self.declare_cursor(task),
            Op::FetchCursor(idx) => self.fetch(task, idx),
            Op::Intrude(target) => self.intrude(task, &target)?,
        };
        let result = match result {
            // a vanished resource the model still tracks is a contract violation
            Err(err) if err.is_not_found() || err.is_not_owner() => {
                return Err(format!("task {}: unexpected {err}", task.id));
            }
            other => other,
        };
        Ok(StepOutcome::of(task, result))
    }

    fn conn<'t>(&self, task: &'t TaskState) -> Result<&'t str, BridgeError> {
        task.conn
            .as_deref()
            .ok_or_else(|| {
                BridgeError::InvalidArgument(format!("task {} has no connection", task.id))
            })
    }

    fn connect(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let path = self.dir.path().join(format!("task{}.db", task.id));
        let conn = self
            .bridge
            .connect(ConnectOptions::local(path.to_string_lossy().into_owned()))?;
        task.conn = Some(conn.clone());
        self.bridge.query_args(&conn, SCHEMA, &[])?;
        Ok(())
    }

    fn close(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let conn = self.conn(task)?.to_string();
        let result = self.bridge.close(&conn);
        task.clear();
        result
    }

    fn begin(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let txn = self.bridge.begin_with_mode(self.conn(task)?, self.txn_mode)?;
        task.txn = Some(txn);
        Ok(())
    }

    fn finish(&self, task: &mut TaskState, commit: bool) -> Result<(), BridgeError> {
        let conn = self.conn(task)?;
        let txn = task.txn.as_deref().unwrap_or_default();
        let result = if commit {
            self.bridge.commit(txn, conn)
        } else {
            self.bridge.rollback(txn, conn)
        };
        // the id is released even when the native call fails
        task.end_transaction();
        result
    }

    fn insert(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let conn = self.conn(task)?;
        let params = [
            RowValues::Int(i64::try_from(task.id).unwrap_or_default()),
            RowValues::Text(format!("from task {}", task.id)),
        ];
        match &task.txn {
            Some(txn) => self.bridge.execute_in_transaction(txn, conn, INSERT, &params).map(drop),
            None => self.bridge.query_args(conn, INSERT, &params).map(drop),
        }
    }

    fn count(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let conn = self.conn(task)?;
        let result = match &task.txn {
            Some(txn) => self.bridge.query_in_transaction(txn, conn, COUNT, &[])?,
            None => self.bridge.query_args(conn, COUNT, &[])?,
        };
        if result.row_count == 1 {
            Ok(())
        } else {
            Err(BridgeError::Internal(format!(
                "count returned {} rows",
                result.row_count
            )))
        }
    }

    fn savepoint(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let name = task.next_savepoint_name();
        let conn = self.conn(task)?;
        let txn = task.txn.as_deref().unwrap_or_default();
        self.bridge.create_savepoint(txn, conn, &name)?;
        task.savepoints.push(name);
        Ok(())
    }

    fn unwind(
        &self,
        task: &mut TaskState,
        idx: usize,
        rollback_to: bool,
    ) -> Result<(), BridgeError> {
        let conn = self.conn(task)?;
        let txn = task.txn.as_deref().unwrap_or_default();
        let Some(name) = task.savepoints.get(idx) else {
            return Ok(());
        };
        if rollback_to {
            self.bridge.rollback_to_savepoint(txn, conn, name)?;
            task.savepoints.truncate(idx + 1);
        } else {
            self.bridge.release_savepoint(txn, conn, name)?;
            task.savepoints.truncate(idx);
        }
        Ok(())
    }

    fn prepare(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let stmt = self.bridge.prepare(self.conn(task)?, INSERT)?;
        let info = self.bridge.introspect(&stmt)?;
        task.statements.push(stmt);
        if info.parameter_count == 2 {
            Ok(())
        } else {
            Err(BridgeError::Internal(format!(
                "prepared insert reports {} parameters",
                info.parameter_count
            )))
        }
    }

    fn run_prepared(&self, task: &mut TaskState, idx: usize) -> Result<(), BridgeError> {
        let conn = self.conn(task)?;
        let Some(stmt) = task.statements.get(idx) else {
            return Ok(());
        };
        let params = [
            RowValues::Int(i64::try_from(task.id).unwrap_or_default()),
            RowValues::Text("prepared".to_string()),
        ];
        self.bridge.execute_statement(stmt, conn, &params).map(drop)
    }

    fn declare_cursor(&self, task: &mut TaskState) -> Result<(), BridgeError> {
        let conn = self.conn(task)?;
        let cursor = match &task.txn {
            Some(txn) => self.bridge.declare_cursor_in_transaction(txn, conn, SCAN, &[])?,
            None => self.bridge.declare_cursor(conn, SCAN, &[])?,
        };
        task.cursors.push(cursor);
        Ok(())
    }

    fn fetch(&self, task: &mut TaskState, idx: usize) -> Result<(), BridgeError> {
        let Some(cursor) = task.cursors.get(idx).cloned() else {
            return Ok(());
        };
        let conn = self.conn(task)?.to_string();
        match self.bridge.fetch_cursor(&cursor, &conn, Some(self.fetch_size)) {
            Ok(page) => {
                if page.exhausted {
                    task.cursors.remove(idx);
                }
                Ok(())
            }
            Err(err) if err.is_not_found() => Err(err),
            Err(err) => {
                // failed streams are released by the bridge
                task.cursors.remove(idx);
                Err(err)
            }
        }
    }

    /// Use another task's resource through this task's connection. Anything but
    /// `NotOwner` is a contract violation.
    fn intrude(
        &self,
        task: &mut TaskState,
        target: &Foreign,
    ) -> Result<Result<(), BridgeError>, String> {
        let Ok(conn) = self.conn(task) else {
            return Ok(Ok(()));
        };
        let (kind, result) = match target {
            Foreign::Transaction(txn) => (
                ResourceKind::Transaction,
                self.bridge.execute_in_transaction(txn, conn, INSERT, &[]).map(drop),
            ),
            Foreign::Statement(stmt) => (
                ResourceKind::Statement,
                self.bridge.execute_statement(stmt, conn, &[]).map(drop),
            ),
            Foreign::Cursor(cursor) => (
                ResourceKind::Cursor,
                self.bridge.fetch_cursor(cursor, conn, Some(1)).map(drop),
            ),
        };
        match result {
            Err(BridgeError::NotOwner { kind: reported, .. }) if reported == kind => Ok(Ok(())),
            other => Err(format!(
                "task {} intruding on {target:?} got {other:?}, expected NotOwner",
                task.id
            )),
        }
    }
}
