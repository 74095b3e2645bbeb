//! Named savepoints inside an owned transaction.
//!
//! Names are interpolated into SQL text, so they are validated against a strict identifier
//! pattern before anything else happens. The stack of active names lives in the
//! transaction's registry entry and is only touched under the registry lock; the native
//! `SAVEPOINT` statements run after the lock is released.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::{TransactionEntry, with_open};
use crate::bridge::Bridge;
use crate::error::{BridgeError, ResourceKind};

lazy_static! {
    static ref SAVEPOINT_NAME: Result<Regex, regex::Error> =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$");
}

/// Reject anything that is not a plain ASCII identifier.
///
/// # Errors
/// [`BridgeError::InvalidIdentifier`] describing the problem.
pub fn validate_savepoint_name(name: &str) -> Result<(), BridgeError> {
    if name.is_empty() {
        return Err(BridgeError::InvalidIdentifier(
            "savepoint name cannot be empty".to_string(),
        ));
    }
    let pattern = SAVEPOINT_NAME
        .as_ref()
        .map_err(|e| BridgeError::Internal(format!("savepoint pattern: {e}")))?;
    if !pattern.is_match(name) {
        return Err(BridgeError::InvalidIdentifier(format!(
            "savepoint name `{name}` must be letters, digits and underscores, not starting with a digit"
        )));
    }
    Ok(())
}

/// Innermost savepoint matching `name`. The engine folds ASCII case in identifiers.
fn position(entry: &TransactionEntry, name: &str) -> Option<usize> {
    entry
        .savepoints
        .iter()
        .rposition(|sp| sp.eq_ignore_ascii_case(name))
}

impl Bridge {
    /// `SAVEPOINT name` inside the transaction.
    ///
    /// # Errors
    /// `InvalidIdentifier` for bad or duplicate names, `NotOwner`, `NotFound`, `Native`.
    pub fn create_savepoint(
        &self,
        txn_id: &str,
        conn_id: &str,
        name: &str,
    ) -> Result<(), BridgeError> {
        validate_savepoint_name(name)?;
        let handle = self
            .transactions
            .with_entry_mut(txn_id, |entry| {
                if entry.owner != conn_id {
                    return Err(BridgeError::not_owner(ResourceKind::Transaction, txn_id));
                }
                if position(entry, name).is_some() {
                    return Err(BridgeError::InvalidIdentifier(format!(
                        "savepoint `{name}` already exists in this transaction"
                    )));
                }
                // reserved now so a concurrent create with the same name fails
                entry.savepoints.push(name.to_string());
                Ok(std::sync::Arc::clone(&entry.handle))
            })??;

        let sql = format!("SAVEPOINT {name}");
        let created = self.run(async move {
            with_open(txn_id, &handle, async |txn| {
                txn.execute(&sql, ()).await?;
                Ok(())
            })
            .await
        });
        if created.is_err() {
            let released = self.transactions.with_entry_mut(txn_id, |entry| {
                if let Some(pos) = position(entry, name) {
                    entry.savepoints.remove(pos);
                }
            });
            if let Err(err) = released {
                warn!(
                    txn_id,
                    savepoint = name,
                    error = %err,
                    "savepoint reservation not released"
                );
            }
        } else {
            debug!(txn_id, savepoint = name, "savepoint created");
        }
        created
    }

    /// `RELEASE SAVEPOINT name`: keep its changes, drop it and every savepoint after it.
    ///
    /// # Errors
    /// `InvalidIdentifier`, `NotOwner`, `NotFound` (transaction or savepoint), `Native`.
    pub fn release_savepoint(
        &self,
        txn_id: &str,
        conn_id: &str,
        name: &str,
    ) -> Result<(), BridgeError> {
        self.unwind_savepoint(txn_id, conn_id, name, "RELEASE SAVEPOINT", 0)
    }

    /// `ROLLBACK TO SAVEPOINT name`: undo everything after it. The savepoint itself and
    /// the transaction stay active; later savepoints are dropped.
    ///
    /// # Errors
    /// `InvalidIdentifier`, `NotOwner`, `NotFound` (transaction or savepoint), `Native`.
    pub fn rollback_to_savepoint(
        &self,
        txn_id: &str,
        conn_id: &str,
        name: &str,
    ) -> Result<(), BridgeError> {
        self.unwind_savepoint(txn_id, conn_id, name, "ROLLBACK TO SAVEPOINT", 1)
    }

    /// `keep` is how many stack frames from `name` onward survive: 0 for release (the
    /// savepoint goes too), 1 for rollback-to (it stays).
    fn unwind_savepoint(
        &self,
        txn_id: &str,
        conn_id: &str,
        name: &str,
        verb: &str,
        keep: usize,
    ) -> Result<(), BridgeError> {
        validate_savepoint_name(name)?;
        let handle = self.transactions.with_owned(txn_id, conn_id, |entry| {
            position(entry, name)
                .map(|_| std::sync::Arc::clone(&entry.handle))
                .ok_or_else(|| BridgeError::not_found(ResourceKind::Savepoint, name))
        })??;

        let sql = format!("{verb} {name}");
        self.run(async move {
            with_open(txn_id, &handle, async |txn| {
                txn.execute(&sql, ()).await?;
                Ok(())
            })
            .await
        })?;

        self.transactions.with_entry_mut(txn_id, |entry| {
            if let Some(pos) = position(entry, name) {
                entry.savepoints.truncate(pos + keep);
            }
        })?;
        debug!(txn_id, savepoint = name, verb, "savepoint unwound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for name in ["sp1", "_tmp", "Import_Batch_42", "a"] {
            assert!(validate_savepoint_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_anything_that_could_escape_the_statement() {
        for name in [
            "",
            "1sp",
            "sp-1",
            "sp 1",
            "sp;DROP TABLE users",
            "sp'--",
            "\"sp\"",
            "spé",
        ] {
            assert!(
                matches!(
                    validate_savepoint_name(name),
                    Err(BridgeError::InvalidIdentifier(_))
                ),
                "{name:?}"
            );
        }
    }
}
