use std::collections::HashSet;

use libsql_bridge::Bridge;

use crate::model::{TaskState, expected_counts};

pub(crate) struct Oracle;

impl Oracle {
    /// Compare the bridge's registries with the model after a step.
    pub(crate) fn check(bridge: &Bridge, tasks: &[TaskState]) -> Result<(), String> {
        let mut seen = HashSet::new();
        for task in tasks {
            for id in task.owned_ids() {
                if !seen.insert(id.as_str()) {
                    return Err(format!("id {id} handed out twice (task {})", task.id));
                }
            }
            if (task.txn.is_some() || !task.statements.is_empty() || !task.cursors.is_empty())
                && task.conn.is_none()
            {
                return Err(format!("task {} holds children without a connection", task.id));
            }
        }

        let actual = bridge
            .resource_counts()
            .map_err(|e| format!("resource_counts failed: {e}"))?;
        let expected = expected_counts(tasks);
        if actual != expected {
            return Err(format!("registry counts {actual:?}, model expects {expected:?}"));
        }

        for task in tasks {
            let (Some(conn), Some(txn)) = (&task.conn, &task.txn) else {
                continue;
            };
            let status = bridge
                .transaction_status(txn, conn)
                .map_err(|e| format!("task {} lost transaction {txn}: {e}", task.id))?;
            if status.is_autocommit {
                return Err(format!("task {} has {txn} open but conn is in autocommit", task.id));
            }
            if status.savepoints != task.savepoints {
                return Err(format!(
                    "task {} savepoints {:?}, model expects {:?}",
                    task.id, status.savepoints, task.savepoints
                ));
            }
        }

        Ok(())
    }
}
