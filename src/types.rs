use std::str::FromStr;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::BridgeError;

/// Values that can be bound as parameters or returned in a row.
///
/// ```rust
/// use libsql_bridge::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value, bound as 0/1
    Bool(bool),
    /// Timestamp value, bound as `YYYY-MM-DD HH:MM:SS[.f]` text
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value, bound as its text encoding
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Read a timestamp back from the text form it was bound as.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .ok(),
            _ => None,
        }
    }
}

/// One SQL statement plus its bound parameters, as used by batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAndParams {
    pub query: String,
    pub params: Vec<RowValues>,
}

impl QueryAndParams {
    pub fn new(query: impl Into<String>, params: Vec<RowValues>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    pub fn new_without_params(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }
}

/// How a connection reaches its database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum ConnectionMode {
    /// Local database file (or `:memory:`)
    Local,
    /// Remote libsql server over HTTP
    Remote,
    /// Local file kept in sync with a remote primary
    Replica,
}

impl FromStr for ConnectionMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ConnectionMode::Local),
            "remote" => Ok(ConnectionMode::Remote),
            "replica" | "remote_replica" => Ok(ConnectionMode::Replica),
            other => Err(BridgeError::InvalidOptions(format!(
                "unknown connection mode `{other}`"
            ))),
        }
    }
}

/// Whether a replica connection syncs automatically after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
pub enum SyncPolicy {
    #[default]
    Enabled,
    Disabled,
}

impl FromStr for SyncPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enabled" | "enable_sync" | "true" | "on" => Ok(SyncPolicy::Enabled),
            "disabled" | "disable_sync" | "false" | "off" => Ok(SyncPolicy::Disabled),
            other => Err(BridgeError::InvalidOptions(format!(
                "unknown sync policy `{other}`"
            ))),
        }
    }
}

/// Transaction start mode, controlling when locks are acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
pub enum TransactionMode {
    /// Locks taken lazily on first access
    #[default]
    Deferred,
    /// Write lock taken at BEGIN
    Immediate,
    /// Blocks every other connection
    Exclusive,
    /// Snapshot reads without a write lock
    ReadOnly,
}

impl TransactionMode {
    pub(crate) fn behavior(self) -> libsql::TransactionBehavior {
        match self {
            TransactionMode::Deferred => libsql::TransactionBehavior::Deferred,
            TransactionMode::Immediate => libsql::TransactionBehavior::Immediate,
            TransactionMode::Exclusive => libsql::TransactionBehavior::Exclusive,
            TransactionMode::ReadOnly => libsql::TransactionBehavior::ReadOnly,
        }
    }
}

impl FromStr for TransactionMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deferred" => Ok(TransactionMode::Deferred),
            "immediate" => Ok(TransactionMode::Immediate),
            "exclusive" => Ok(TransactionMode::Exclusive),
            "read_only" | "readonly" | "read-only" => Ok(TransactionMode::ReadOnly),
            other => Err(BridgeError::InvalidArgument(format!(
                "unknown transaction mode `{other}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_strings_parse() -> Result<(), BridgeError> {
        assert_eq!("remote_replica".parse::<ConnectionMode>()?, ConnectionMode::Replica);
        assert_eq!("LOCAL".parse::<ConnectionMode>()?, ConnectionMode::Local);
        assert_eq!("read_only".parse::<TransactionMode>()?, TransactionMode::ReadOnly);
        assert_eq!("disable_sync".parse::<SyncPolicy>()?, SyncPolicy::Disabled);
        assert!("sideways".parse::<ConnectionMode>().is_err());
        Ok(())
    }

    #[test]
    fn timestamp_reads_back_from_text() {
        let text = RowValues::Text("2024-01-02 03:04:05.250".into());
        let ts = text.as_timestamp().map(|t| t.to_string());
        assert_eq!(ts.as_deref(), Some("2024-01-02 03:04:05.250"));
        assert!(RowValues::Int(3).as_timestamp().is_none());
    }
}
