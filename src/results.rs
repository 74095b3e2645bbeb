use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{RowValues, TransactionMode};

/// Outcome of one routed statement.
///
/// Row-producing statements fill `columns` and `rows` and report `row_count = rows.len()`.
/// Commands leave both empty and report the number of affected rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Arc<Vec<String>>,
    pub rows: Vec<Vec<RowValues>>,
    pub row_count: u64,
}

impl QueryResult {
    #[must_use]
    pub fn affected(row_count: u64) -> Self {
        Self {
            row_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_rows(columns: Arc<Vec<String>>, rows: Vec<Vec<RowValues>>) -> Self {
        let row_count = rows.len() as u64;
        Self {
            columns,
            rows,
            row_count,
        }
    }

    /// Index of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at (`row`, `column`), if both exist.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&RowValues> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// One page served by a cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedRows {
    pub columns: Arc<Vec<String>>,
    pub rows: Vec<Vec<RowValues>>,
    /// No rows remain; the cursor has already been released.
    pub exhausted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Source column the result column was read from, falling back to `name`.
    pub origin_name: String,
    pub decl_type: Option<String>,
}

/// Metadata captured once when a statement is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementInfo {
    pub sql: String,
    pub parameter_count: usize,
    /// Declared parameter names; `None` for anonymous `?` parameters.
    pub parameter_names: Vec<Option<String>>,
    pub columns: Vec<ColumnInfo>,
}

impl StatementInfo {
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Parameter name by SQLite's 1-based index.
    #[must_use]
    pub fn parameter_name(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.parameter_names.get(i))
            .and_then(|name| name.as_deref())
    }
}

/// Result of a ping round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionHealth {
    Alive,
    Disconnected { reason: String },
}

impl ConnectionHealth {
    #[must_use]
    pub fn is_alive(&self) -> bool {
        matches!(self, ConnectionHealth::Alive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub mode: TransactionMode,
    pub savepoints: Vec<String>,
    pub is_autocommit: bool,
}
