use crate::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// How a shelf maintains a secondary index over one of its fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IndexKind {
    /// At most one record may hold a given value for this field.
    Unique,
    /// Any number of records may share a value for this field.
    Any,
}

/// Bookkeeping a record carries alongside its fields: the primary key it was
/// stored under, the shelf it was last read from or saved to, and which
/// fields participate in a unique or an any index. This is the persistence
/// metadata `make-instance` attaches at creation time and `passoc!`/
/// `pdissoc!` must preserve across mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecordMeta {
    pub primary_key: Uuid,
    pub shelf_name: Option<String>,
    pub unique_indexes: BTreeSet<String>,
    pub any_indexes: BTreeSet<String>,
}

impl RecordMeta {
    pub fn new() -> Self {
        Self {
            primary_key: Uuid::new_v4(),
            shelf_name: None,
            unique_indexes: BTreeSet::new(),
            any_indexes: BTreeSet::new(),
        }
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = (&str, IndexKind)> {
        self.unique_indexes
            .iter()
            .map(|f| (f.as_str(), IndexKind::Unique))
            .chain(self.any_indexes.iter().map(|f| (f.as_str(), IndexKind::Any)))
    }
}

/// A named bag of field values plus the metadata the persistence layer needs
/// to track it: its primary key and, once saved, the shelf it lives on.
///
/// `passoc`/`pdissoc` mutate `fields` in place but never touch `meta`, so a
/// record round-tripped through `save` keeps the same primary key.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
    pub meta: RecordMeta,
}

impl Record {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            meta: RecordMeta::new(),
        }
    }

    pub fn with_fields(fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            meta: RecordMeta::new(),
        }
    }

    pub fn primary_key(&self) -> Uuid {
        self.meta.primary_key
    }

    pub fn shelf_name(&self) -> Option<&str> {
        self.meta.shelf_name.as_deref()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field, returning the value it replaced, if any. This is the
    /// primitive `passoc!` builds on.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// Removes a field, returning its prior value, if any. This is the
    /// primitive `pdissoc!` builds on.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}
