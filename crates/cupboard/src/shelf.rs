use kvengine::IndexKind;
use std::collections::HashMap;
use std::sync::Mutex;

/// A live handle onto one of a shelf's secondary indices.
#[derive(Clone, Debug)]
pub struct IndexHandle {
    pub name: String,
    pub kind: IndexKind,
}

/// A named primary record collection. Holds no storage handle of its own —
/// the underlying primary database lives in the [`kvengine::Env`] under
/// `name` — only the bookkeeping of which indices are currently open and
/// which of the two lookup disciplines (unique, at-most-one; any, a
/// stream) each belongs to.
pub struct Shelf {
    pub name: String,
    unique_indexes: Mutex<HashMap<String, IndexHandle>>,
    any_indexes: Mutex<HashMap<String, IndexHandle>>,
}

impl Shelf {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_indexes: Mutex::new(HashMap::new()),
            any_indexes: Mutex::new(HashMap::new()),
        }
    }

    pub fn index_kind(&self, index_name: &str) -> Option<IndexKind> {
        if let Some(h) = self.unique_indexes.lock().unwrap().get(index_name) {
            return Some(h.kind);
        }
        self.any_indexes
            .lock()
            .unwrap()
            .get(index_name)
            .map(|h| h.kind)
    }

    pub fn unique_index_names(&self) -> Vec<String> {
        self.unique_indexes.lock().unwrap().keys().cloned().collect()
    }

    pub fn any_index_names(&self) -> Vec<String> {
        self.any_indexes.lock().unwrap().keys().cloned().collect()
    }

    /// Registers `index_name` under the map matching `kind`. A no-op if it
    /// is already registered — every index belongs to exactly one of the
    /// two maps, never both.
    pub fn register_index(&self, index_name: String, kind: IndexKind) {
        if self.index_kind(&index_name).is_some() {
            return;
        }
        let handle = IndexHandle {
            name: index_name.clone(),
            kind,
        };
        match kind {
            IndexKind::Unique => {
                self.unique_indexes.lock().unwrap().insert(index_name, handle);
            }
            IndexKind::Any => {
                self.any_indexes.lock().unwrap().insert(index_name, handle);
            }
        }
    }

    pub fn remove_index(&self, index_name: &str) {
        self.unique_indexes.lock().unwrap().remove(index_name);
        self.any_indexes.lock().unwrap().remove(index_name);
    }
}
