use std::sync::Arc;

use libsql::{Row, Rows, Value};

use crate::error::BridgeError;
use crate::results::QueryResult;
use crate::types::RowValues;

/// Column names of a native row stream, available before the first row is read.
pub(crate) fn column_names(rows: &Rows) -> Arc<Vec<String>> {
    let count = rows.column_count().max(0);
    let names = (0..count)
        .map(|i| {
            rows.column_name(i)
                .map_or_else(|| format!("column_{i}"), ToString::to_string)
        })
        .collect();
    Arc::new(names)
}

/// Read one row into host values.
pub(crate) fn convert_row(row: &Row, column_count: usize) -> Result<Vec<RowValues>, BridgeError> {
    let mut values = Vec::with_capacity(column_count);
    for i in 0..column_count {
        let idx = i32::try_from(i)
            .map_err(|e| BridgeError::Internal(format!("Invalid column index: {e}")))?;
        values.push(from_native(row.get_value(idx)?));
    }
    Ok(values)
}

/// Drain a row stream into a [`QueryResult`].
pub(crate) async fn collect_rows(mut rows: Rows) -> Result<QueryResult, BridgeError> {
    let columns = column_names(&rows);
    let mut collected = Vec::new();
    while let Some(row) = rows.next().await? {
        collected.push(convert_row(&row, columns.len())?);
    }
    Ok(QueryResult::with_rows(columns, collected))
}

/// Values come back with their storage class only; no guessing of JSON or timestamps.
pub(crate) fn from_native(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(bytes) => RowValues::Blob(bytes),
    }
}
