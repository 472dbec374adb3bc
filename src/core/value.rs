//! Purpose: Tagged runtime values exchanged between CSV text and SQLite bindings.
//! Exports: `Value`.
//! Role: Every conversion between a CSV field and a database value goes through here.
//! Invariants: An empty field always converts to `Value::Null`, whatever the column type.
//! Invariants: Text rendering of `Real` keeps a fraction or exponent so it re-infers as real.
use std::fmt::{self, Write as _};

use bstr::ByteSlice;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

use crate::core::infer::{self, InferredType};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Converts a CSV field to the declared column type.
    ///
    /// Returns `None` when the field is wider than the column allows, which can
    /// only happen if the file changed after its types were inferred.
    pub fn from_field(field: &str, column_type: InferredType) -> Option<Value> {
        let inferred = infer::infer(field);
        if inferred == InferredType::Null {
            return Some(Value::Null);
        }
        if inferred > column_type && column_type != InferredType::Null {
            return None;
        }
        match column_type {
            InferredType::Integer => field.parse().ok().map(Value::Integer),
            InferredType::Real => field.parse().ok().map(Value::Real),
            InferredType::Null | InferredType::Text => Some(Value::Text(field.to_string())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Appends the canonical text form used for CSV output. `Null` appends nothing.
    pub fn write_text(&self, out: &mut String) {
        match self {
            Value::Null => {}
            Value::Integer(value) => {
                let _ = write!(out, "{value}");
            }
            Value::Real(value) => write_real(*value, out),
            Value::Text(value) => out.push_str(value),
        }
    }
}

fn write_real(value: f64, out: &mut String) {
    // Overflowing literals parse back to infinity and still infer as real.
    if value.is_infinite() {
        out.push_str(if value > 0.0 { "1e999" } else { "-1e999" });
        return;
    }
    // Debug formatting is the shortest round-trip form and keeps `.0` on integral values.
    let _ = write!(out, "{value:?}");
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Real(value) => write!(f, "{value:?}"),
            Value::Text(value) => f.write_str(value),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(value) => Value::Integer(value),
            ValueRef::Real(value) => Value::Real(value),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Value::Text(bytes.to_str_lossy().into_owned())
            }
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(value) => ToSqlOutput::Borrowed(ValueRef::Integer(*value)),
            Value::Real(value) => ToSqlOutput::Borrowed(ValueRef::Real(*value)),
            Value::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}
