//! Purpose: Classify untyped CSV fields and fold per-column types across rows.
//! Exports: `InferredType`, `infer`, `widen`.
//! Role: Leaf of the import path; the schema builder consumes its folded result.
//! Invariants: `infer` is a pure, total function of its input; it never panics.
//! Invariants: `Null ⊏ Integer ⊏ Real ⊏ Text`; `widen` is the least upper bound.

/// Declaration order is the widening order; `Ord` is derived from it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum InferredType {
    Null,
    Integer,
    Real,
    Text,
}

impl InferredType {
    /// SQL type name used in table DDL. `Null` columns are declared as text.
    pub fn sql_name(self) -> &'static str {
        match self {
            InferredType::Integer => "INTEGER",
            InferredType::Real => "REAL",
            InferredType::Null | InferredType::Text => "TEXT",
        }
    }
}

pub fn infer(field: &str) -> InferredType {
    if field.is_empty() {
        return InferredType::Null;
    }
    if is_integer_literal(field) {
        // Integer literals outside the i64 range are stored as floating point.
        return if field.parse::<i64>().is_ok() {
            InferredType::Integer
        } else {
            InferredType::Real
        };
    }
    if is_real_literal(field) {
        return InferredType::Real;
    }
    InferredType::Text
}

pub fn widen(current: InferredType, next: InferredType) -> InferredType {
    current.max(next)
}

fn strip_sign(s: &[u8]) -> &[u8] {
    match s.first() {
        Some(b'+') | Some(b'-') => &s[1..],
        _ => s,
    }
}

fn is_integer_literal(field: &str) -> bool {
    let digits = strip_sign(field.as_bytes());
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}

fn is_real_literal(field: &str) -> bool {
    let bytes = strip_sign(field.as_bytes());
    let mut idx = 0;

    let int_digits = count_digits(&bytes[idx..]);
    idx += int_digits;
    let mut frac_digits = 0;
    if bytes.get(idx) == Some(&b'.') {
        idx += 1;
        frac_digits = count_digits(&bytes[idx..]);
        idx += frac_digits;
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }

    if matches!(bytes.get(idx), Some(b'e') | Some(b'E')) {
        idx += 1;
        let exponent = strip_sign(&bytes[idx..]);
        idx = bytes.len() - exponent.len();
        let exp_digits = count_digits(exponent);
        if exp_digits == 0 {
            return false;
        }
        idx += exp_digits;
    }

    idx == bytes.len()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
