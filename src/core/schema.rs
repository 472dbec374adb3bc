//! Purpose: Turn a CSV header and folded column types into a table schema.
//! Exports: `ColumnSpec`, `build`, `column_name`.
//! Role: Runs once per import, between the inference pass and table creation.
//! Invariants: Column names in one schema are unique and safe to use unquoted.
//! Invariants: Deduplication is deterministic: first occurrence wins, later ones get `_2`, `_3`, ...
use std::collections::HashSet;

use crate::core::error::{Error, ErrorKind};
use crate::core::infer::InferredType;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: InferredType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: InferredType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

pub fn build<S: AsRef<str>>(
    header: &[S],
    column_types: &[InferredType],
) -> Result<Vec<ColumnSpec>, Error> {
    if header.len() != column_types.len() {
        return Err(Error::new(ErrorKind::MalformedCsv).with_message(format!(
            "header has {} columns but {} column types were inferred",
            header.len(),
            column_types.len()
        )));
    }

    let mut seen = HashSet::with_capacity(header.len());
    let mut columns = Vec::with_capacity(header.len());
    for (idx, (label, data_type)) in header.iter().zip(column_types).enumerate() {
        let label = label.as_ref();
        if label.is_empty() {
            return Err(Error::new(ErrorKind::MalformedCsv)
                .with_message(format!("header column {} is empty", idx + 1))
                .with_hint("Every column needs a name in the first row of the file."));
        }

        let base = column_name(label);
        let mut name = base.clone();
        let mut suffix = 2u32;
        while seen.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        seen.insert(name.clone());

        // No evidence means no narrower type; all-blank columns are nullable text.
        let data_type = match data_type {
            InferredType::Null => InferredType::Text,
            other => *other,
        };
        columns.push(ColumnSpec { name, data_type });
    }

    Ok(columns)
}

/// Lowercases a header label and maps it onto `[a-z0-9_]`, collapsing runs of `_`.
pub fn column_name(label: &str) -> String {
    let mut name = String::with_capacity(label.len());
    for ch in label.chars().flat_map(char::to_lowercase) {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '_'
        };
        if ch == '_' && name.ends_with('_') {
            continue;
        }
        name.push(ch);
    }
    name
}
