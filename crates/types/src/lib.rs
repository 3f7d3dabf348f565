#[cfg(test)]
mod tests;

mod record;

pub use record::{IndexKind, Record, RecordMeta};

use std::cmp::Ordering;

/// A single record field value.
///
/// Only same-variant comparisons are meaningful; comparing across variants
/// (e.g. `Int` against `Text`) yields `None` rather than panicking, so
/// callers driving range predicates can treat type mismatches as "no match"
/// instead of an error.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Uuid(uuid::Uuid),
    Null,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<uuid::Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Encode this value into a byte string whose lexicographic order
    /// matches [`Value::cmp_same_type`]. Secondary-index cursors key on this
    /// encoding so a range scan can walk the underlying ordered store
    /// directly instead of re-deserializing every candidate.
    pub fn encode_key(&self) -> Vec<u8> {
        match self {
            Value::Int(i) => {
                let mut bytes = Vec::with_capacity(9);
                bytes.push(0u8);
                // Flip the sign bit so two's-complement bytes sort numerically.
                bytes.extend_from_slice(&((*i as u64) ^ (1u64 << 63)).to_be_bytes());
                bytes
            }
            Value::Text(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len());
                bytes.push(1u8);
                bytes.extend_from_slice(s.as_bytes());
                bytes
            }
            Value::Bool(b) => vec![2u8, *b as u8],
            Value::Uuid(u) => {
                let mut bytes = Vec::with_capacity(17);
                bytes.push(3u8);
                bytes.extend_from_slice(u.as_bytes());
                bytes
            }
            Value::Null => vec![4u8],
        }
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.eq(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.eq(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.eq(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.eq(b)),
            _ => None,
        }
    }
}
