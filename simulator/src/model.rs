use libsql_bridge::{ResourceCounts, ResourceId};

/// Someone else's resource, used to exercise ownership checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Foreign {
    Transaction(ResourceId),
    Statement(ResourceId),
    Cursor(ResourceId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Connect,
    Close,
    Begin,
    Commit,
    Rollback,
    Insert,
    Count,
    Savepoint,
    ReleaseSavepoint(usize),
    RollbackToSavepoint(usize),
    Prepare,
    RunPrepared(usize),
    DeclareCursor,
    FetchCursor(usize),
    Intrude(Foreign),
    Sleep(u64),
}

/// What the simulator believes one host thread holds.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskState {
    pub(crate) id: usize,
    pub(crate) conn: Option<ResourceId>,
    pub(crate) txn: Option<ResourceId>,
    pub(crate) savepoints: Vec<String>,
    pub(crate) statements: Vec<ResourceId>,
    pub(crate) cursors: Vec<ResourceId>,
    pub(crate) savepoint_seq: u32,
}

impl TaskState {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Forget everything the connection owned, as `close` does.
    pub(crate) fn clear(&mut self) {
        self.conn = None;
        self.end_transaction();
        self.statements.clear();
        self.cursors.clear();
    }

    pub(crate) fn end_transaction(&mut self) {
        self.txn = None;
        self.savepoints.clear();
    }

    pub(crate) fn next_savepoint_name(&mut self) -> String {
        self.savepoint_seq += 1;
        format!("sp_{}_{}", self.id, self.savepoint_seq)
    }

    pub(crate) fn owned_ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.conn
            .iter()
            .chain(self.txn.iter())
            .chain(self.statements.iter())
            .chain(self.cursors.iter())
    }
}

/// Registry sizes the bridge should report for these tasks.
pub(crate) fn expected_counts(tasks: &[TaskState]) -> ResourceCounts {
    tasks.iter().fold(ResourceCounts::default(), |mut acc, task| {
        acc.connections += usize::from(task.conn.is_some());
        acc.transactions += usize::from(task.txn.is_some());
        acc.statements += task.statements.len();
        acc.cursors += task.cursors.len();
        acc
    })
}
