use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Kind of resource a [`crate::ResourceId`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Connection,
    Transaction,
    Statement,
    Cursor,
    Savepoint,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Connection => "connection",
            ResourceKind::Transaction => "transaction",
            ResourceKind::Statement => "statement",
            ResourceKind::Cursor => "cursor",
            ResourceKind::Savepoint => "savepoint",
        };
        f.write_str(label)
    }
}

/// Every error the bridge hands back to a caller.
///
/// The enum is `Clone` so a single failure can be reported to several waiters (the
/// process-wide bridge caches its construction error, batches report per statement).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{kind} {id} does not belong to this connection")]
    NotOwner { kind: ResourceKind, id: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid connection options: {0}")]
    InvalidOptions(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Message reported by the native engine, passed through verbatim.
    #[error("{0}")]
    Native(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("batch statement {index} failed: {source}")]
    BatchStatement {
        index: usize,
        source: Box<BridgeError>,
    },

    #[error("Internal bridge error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub(crate) fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        BridgeError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn not_owner(kind: ResourceKind, id: impl Into<String>) -> Self {
        BridgeError::NotOwner {
            kind,
            id: id.into(),
        }
    }

    /// True for `NotFound` of any kind.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound { .. })
    }

    #[must_use]
    pub fn is_not_owner(&self) -> bool {
        matches!(self, BridgeError::NotOwner { .. })
    }
}

impl From<libsql::Error> for BridgeError {
    fn from(err: libsql::Error) -> Self {
        BridgeError::Native(err.to_string())
    }
}
