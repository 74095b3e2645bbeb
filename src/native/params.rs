use libsql::Value;

use crate::types::RowValues;

/// Container for libsql parameters
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
    /// Convert from a slice of `RowValues` to libsql values.
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Params {
        Params(params.iter().map(to_native).collect())
    }

    /// Fill unbound trailing positions with NULL. Native reset keeps old bindings, so a
    /// reused statement would otherwise see the previous call's values there.
    #[must_use]
    pub fn padded_to(mut self, parameter_count: usize) -> Params {
        if self.0.len() < parameter_count {
            self.0.resize(parameter_count, Value::Null);
        }
        self
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

fn to_native(param: &RowValues) -> Value {
    match param {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}
