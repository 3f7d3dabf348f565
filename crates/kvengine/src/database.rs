use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Whether a secondary database tolerates more than one primary key per
/// derived key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    Unique,
    Any,
}

/// A closure deriving a secondary key from a primary record's raw bytes.
/// Returns `None` when the record has no value for the indexed field, in
/// which case the primary entry is simply omitted from the secondary.
pub type KeyCreator = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

#[derive(Clone)]
pub struct SecondaryDef {
    pub name: String,
    pub kind: IndexKind,
    pub key_creator: KeyCreator,
}

impl fmt::Debug for SecondaryDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// An ordered, disk-backed table of byte keys to byte values.
///
/// A primary database keeps at most one value per key and carries the list
/// of secondary databases registered against it; a secondary database may
/// allow duplicate keys (`sorted_duplicates`) when its [`IndexKind`] is
/// `Any`. Secondary databases are never mutated directly by callers — only
/// through the registry-level maintenance in `env.rs`, which keeps a
/// primary's secondaries in sync on every `put`/`delete`.
#[derive(Debug, Clone)]
pub struct Database {
    pub name: String,
    pub sorted_duplicates: bool,
    pub data: BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
    pub secondaries: Vec<SecondaryDef>,
}

impl Database {
    pub fn new(name: impl Into<String>, sorted_duplicates: bool) -> Self {
        Self {
            name: name.into(),
            sorted_duplicates,
            data: BTreeMap::new(),
            secondaries: Vec::new(),
        }
    }

    pub fn add_secondary(&mut self, def: SecondaryDef) {
        self.secondaries.push(def);
    }

    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.data.get(key).and_then(|values| values.first())
    }

    pub fn get_all(&self, key: &[u8]) -> &[Vec<u8>] {
        self.data.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Inserts `value` under `key`. On a unique database this replaces
    /// whatever was there; on a `sorted_duplicates` database it appends,
    /// preserving insertion order among values sharing a key.
    pub fn raw_put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        if self.sorted_duplicates {
            self.data.entry(key).or_default().push(value);
            None
        } else {
            self.data.insert(key, vec![value]).map(|mut v| v.remove(0))
        }
    }

    pub fn raw_delete(&mut self, key: &[u8]) -> Vec<Vec<u8>> {
        self.data.remove(key).unwrap_or_default()
    }

    /// Removes a single `(key, value)` pair from a duplicate-permitting
    /// secondary, used when a primary record's indexed field changes.
    pub fn raw_delete_value(&mut self, key: &[u8], value: &[u8]) {
        if let Some(values) = self.data.get_mut(key) {
            values.retain(|v| v != value);
            if values.is_empty() {
                self.data.remove(key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
