//! The persistent registry of shelf and index options.
//!
//! Every shelf's options live under its own name in the reserved `_shelves`
//! database; every index's options live under the composite key
//! `"<shelf>:<index>"`. `:` is therefore reserved in shelf and index names,
//! and `_shelves` is reserved as a shelf name — both validated here so the
//! rule is enforced in exactly one place.

#[cfg(test)]
mod tests;

use bincode::config::{self, Config};
use common::{StoreError, StoreResult};
use kvengine::{Cursor, Env, IsolationLevel, ScanBound, Txn};
use serde::{Deserialize, Serialize};
use std::ops::Bound;

pub const CATALOG_DB_NAME: &str = "_shelves";

/// Options a shelf is opened or reopened with. The only caller-overridable
/// option is `read_only`; everything else is derived at open time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfOptions {
    pub read_only: bool,
}

/// Options an index is opened or reopened with. `sorted_duplicates` is the
/// one per-call option the source recognizes, and once a secondary database
/// actually exists its live setting is ground truth over whatever the
/// caller asks for next time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    pub sorted_duplicates: bool,
}

/// Rejects names that would collide with the catalog's own key scheme.
pub fn validate_name(name: &str) -> StoreResult<()> {
    if name.contains(':') {
        return Err(StoreError::InvalidArgument(format!(
            "name '{name}' must not contain ':'"
        )));
    }
    if name == CATALOG_DB_NAME {
        return Err(StoreError::InvalidArgument(format!(
            "name '{name}' is reserved for the catalog"
        )));
    }
    Ok(())
}

/// The catalog key (and, by convention, the underlying storage engine's
/// secondary database name) for `index` on `shelf`.
pub fn index_key(shelf: &str, index: &str) -> String {
    format!("{shelf}:{index}")
}

/// Handle onto the `_shelves` database. Cheap to clone; every clone shares
/// the same underlying `Env` handle.
#[derive(Clone)]
pub struct Catalog {
    env: Env,
}

impl Catalog {
    /// Ensures the reserved `_shelves` database exists and returns a handle
    /// to it.
    pub fn open(env: &Env) -> StoreResult<Self> {
        env.ensure_database(CATALOG_DB_NAME, false)?;
        Ok(Self { env: env.clone() })
    }

    pub fn shelf_options(&self, name: &str) -> StoreResult<Option<ShelfOptions>> {
        self.env
            .get(CATALOG_DB_NAME, name.as_bytes())
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put_shelf_options(
        &self,
        txn: &mut Txn,
        name: &str,
        options: &ShelfOptions,
    ) -> StoreResult<()> {
        txn.put(CATALOG_DB_NAME, name.as_bytes().to_vec(), encode(options)?)
    }

    pub fn index_options(&self, shelf: &str, index: &str) -> StoreResult<Option<IndexOptions>> {
        let key = index_key(shelf, index);
        self.env
            .get(CATALOG_DB_NAME, key.as_bytes())
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put_index_options(
        &self,
        txn: &mut Txn,
        shelf: &str,
        index: &str,
        options: &IndexOptions,
    ) -> StoreResult<()> {
        let key = index_key(shelf, index);
        txn.put(CATALOG_DB_NAME, key.into_bytes(), encode(options)?)
    }

    /// Every `(index_name, options)` pair currently catalogued for `shelf`.
    pub fn index_entries(&self, shelf: &str) -> StoreResult<Vec<(String, IndexOptions)>> {
        let lower = format!("{shelf}:");
        let mut upper_bytes = lower.clone().into_bytes();
        *upper_bytes.last_mut().unwrap() += 1;

        let mut cursor = Cursor::open(
            &self.env,
            CATALOG_DB_NAME,
            ScanBound::range(Bound::Included(lower.clone().into_bytes()), Bound::Excluded(upper_bytes)),
        );
        let mut entries = Vec::new();
        while let Some((key, value)) = cursor.next()? {
            let composite = String::from_utf8(key)
                .map_err(|e| StoreError::Storage(format!("non-utf8 catalog key: {e}")))?;
            let index_name = composite
                .strip_prefix(&lower)
                .ok_or_else(|| StoreError::Storage("catalog scan returned out-of-range key".into()))?
                .to_string();
            entries.push((index_name, decode(&value)?));
        }
        cursor.close();
        Ok(entries)
    }

    /// Removes a shelf's own entry and every `"<shelf>:*"` index entry, in a
    /// fresh internally-managed transaction.
    pub fn remove_shelf_entries(&self, shelf: &str) -> StoreResult<()> {
        let indices = self.index_entries(shelf)?;
        let mut txn = Txn::begin(&self.env, IsolationLevel::Serializable)?;
        txn.delete(CATALOG_DB_NAME, shelf.as_bytes().to_vec())?;
        for (index_name, _) in indices {
            txn.delete(CATALOG_DB_NAME, index_key(shelf, &index_name).into_bytes())?;
        }
        txn.commit()?;
        tracing::debug!(shelf, "catalog entries removed");
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode_config())
        .map_err(|e| StoreError::Storage(format!("encoding catalog entry: {e}")))
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> StoreResult<T> {
    bincode::serde::decode_from_slice(bytes, bincode_config())
        .map(|(value, _)| value)
        .map_err(|e| StoreError::Storage(format!("decoding catalog entry: {e}")))
}

fn bincode_config() -> impl Config {
    config::legacy()
}
