//! Cupboard lifecycle: the persistence environment rooted at a directory,
//! owning a catalog and every shelf opened against it.

#[cfg(test)]
mod tests;

mod shelf;

pub use shelf::{IndexHandle, Shelf};

use bincode::config::{self, Config};
use catalog::{Catalog, IndexOptions, ShelfOptions};
use common::{EngineConfig, StoreError, StoreResult};
use kvengine::{Env, IndexKind, IsolationLevel, KeyCreator, Txn};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use types::Record;

pub const DEFAULT_SHELF: &str = "_default";

/// Caller-side overrides for [`Cupboard::get_shelf`]. `None` defers to
/// whatever the catalog already has on file, falling back to `false`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShelfOpenOptions {
    pub read_only: Option<bool>,
    pub force_reopen: bool,
}

/// Caller-side overrides for [`Cupboard::get_index`].
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexOpenOptions {
    pub sorted_duplicates: Option<bool>,
}

/// An opened persistence environment: an [`Env`], its [`Catalog`], and the
/// shelves currently live against it.
///
/// Struct fields are declared in the order they must tear down in — shelves
/// (and the index handles they carry) before the catalog handle before the
/// environment handle — so a `Cupboard` dropped on an error path during
/// construction unwinds in the same order `close` would.
#[derive(Clone)]
pub struct Cupboard {
    shelves: Arc<Mutex<HashMap<String, Arc<Shelf>>>>,
    catalog: Catalog,
    env: Env,
}

impl Cupboard {
    /// Opens the cupboard rooted at `dir`, creating it if absent.
    ///
    /// `dir` must not already exist as a regular file. If `dir` is empty
    /// (freshly created or pre-existing but empty), this is a brand-new
    /// environment: the default shelf `_default` is opened eagerly. Either
    /// way, every primary shelf database already present is reopened, and
    /// each of its indices is reopened alongside it with the
    /// `sorted_duplicates` setting it was last stored with.
    pub fn open(dir: impl Into<PathBuf>, mut options: EngineConfig) -> StoreResult<Self> {
        let dir = dir.into();
        if dir.is_file() {
            return Err(StoreError::InvalidArgument(format!(
                "{} is a regular file, not a cupboard directory",
                dir.display()
            )));
        }
        let env_new = if dir.exists() {
            fs::read_dir(&dir)?.next().is_none()
        } else {
            true
        };

        options.data_dir = dir;
        let env = Env::open(options)?;
        let catalog = Catalog::open(&env)?;

        let cupboard = Self {
            shelves: Arc::new(Mutex::new(HashMap::new())),
            catalog,
            env,
        };

        if env_new {
            cupboard.get_shelf(DEFAULT_SHELF, ShelfOpenOptions::default())?;
        }
        for name in cupboard.env.database_names() {
            if name == catalog::CATALOG_DB_NAME || name.contains(':') {
                continue;
            }
            cupboard.get_shelf(&name, ShelfOpenOptions::default())?;
        }

        tracing::debug!(dir = %cupboard.env.data_dir().display(), env_new, "cupboard opened");
        Ok(cupboard)
    }

    /// Drops every open shelf handle. Idempotent — calling it again, or
    /// calling it on a cupboard that opened nothing, is a no-op.
    pub fn close(&self) {
        self.shelves.lock().unwrap().clear();
        tracing::debug!(dir = %self.env.data_dir().display(), "cupboard closed");
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// The environment's database names, filtered to shelves: no `:` and
    /// not the catalog's own reserved name.
    pub fn list_shelves(&self) -> Vec<String> {
        self.env
            .database_names()
            .into_iter()
            .filter(|n| n != catalog::CATALOG_DB_NAME && !n.contains(':'))
            .collect()
    }

    /// Opens `name`, creating it if this is the first reference to it.
    /// Reopening an already-open shelf just returns the live handle, unless
    /// `options.force_reopen` is set.
    pub fn get_shelf(&self, name: &str, options: ShelfOpenOptions) -> StoreResult<Arc<Shelf>> {
        catalog::validate_name(name)?;
        let mut shelves = self.shelves.lock().unwrap();
        if options.force_reopen {
            shelves.remove(name);
        }
        if let Some(existing) = shelves.get(name) {
            return Ok(existing.clone());
        }

        let stored = self.catalog.shelf_options(name)?.unwrap_or_default();
        let merged = ShelfOptions {
            read_only: options.read_only.unwrap_or(stored.read_only),
        };

        self.env.ensure_database(name, false)?;

        let mut txn = Txn::begin(&self.env, IsolationLevel::Serializable)?;
        self.catalog.put_shelf_options(&mut txn, name, &merged)?;
        txn.commit()?;

        let shelf = Arc::new(Shelf::new(name));
        self.open_indices(&shelf)?;
        shelves.insert(name.to_string(), shelf.clone());
        tracing::debug!(shelf = name, "shelf opened");
        Ok(shelf)
    }

    /// Reopens every index the catalog has on file for `shelf`, with the
    /// `sorted_duplicates` setting it was last stored under.
    fn open_indices(&self, shelf: &Shelf) -> StoreResult<()> {
        for (index_name, opts) in self.catalog.index_entries(&shelf.name)? {
            self.get_index_with(
                shelf,
                &index_name,
                IndexOpenOptions {
                    sorted_duplicates: Some(opts.sorted_duplicates),
                },
            )?;
        }
        Ok(())
    }

    /// Opens (or returns the already-open handle for) the index named
    /// `index_name` on `shelf`, deriving its secondary keys from the
    /// `index_name` field of whatever [`Record`] is stored in the shelf.
    pub fn get_index(
        &self,
        shelf: &Shelf,
        index_name: &str,
        options: IndexOpenOptions,
    ) -> StoreResult<IndexKind> {
        self.get_index_with(shelf, index_name, options)
    }

    fn get_index_with(
        &self,
        shelf: &Shelf,
        index_name: &str,
        options: IndexOpenOptions,
    ) -> StoreResult<IndexKind> {
        catalog::validate_name(index_name)?;
        if let Some(kind) = shelf.index_kind(index_name) {
            return Ok(kind);
        }

        let stored = self
            .catalog
            .index_options(&shelf.name, index_name)?
            .unwrap_or_default();
        let requested_sorted_duplicates = options.sorted_duplicates.unwrap_or(stored.sorted_duplicates);

        let secondary_name = catalog::index_key(&shelf.name, index_name);
        if !self.env.database_exists(&secondary_name) {
            let kind = if requested_sorted_duplicates {
                IndexKind::Any
            } else {
                IndexKind::Unique
            };
            self.env.create_secondary(
                &shelf.name,
                &secondary_name,
                kind,
                default_key_creator(index_name.to_string()),
            )?;
        } else {
            // `create_secondary` only ever runs once per secondary; every
            // later open of an already-existing index — including every
            // cupboard reopen — must still reattach the key-creator, since
            // closures don't survive serialization and a reloaded
            // `Database`'s `secondaries` list comes back empty.
            let actual_sorted_duplicates = self
                .env
                .database_sorted_duplicates(&secondary_name)
                .unwrap_or(requested_sorted_duplicates);
            let kind = if actual_sorted_duplicates {
                IndexKind::Any
            } else {
                IndexKind::Unique
            };
            self.env.attach_secondary(
                &shelf.name,
                &secondary_name,
                kind,
                default_key_creator(index_name.to_string()),
            )?;
        }

        // Ground truth: an existing database's actual configuration wins
        // over whatever the caller just asked for.
        let actual_sorted_duplicates = self
            .env
            .database_sorted_duplicates(&secondary_name)
            .unwrap_or(requested_sorted_duplicates);
        let kind = if actual_sorted_duplicates {
            IndexKind::Any
        } else {
            IndexKind::Unique
        };

        let mut txn = Txn::begin(&self.env, IsolationLevel::Serializable)?;
        self.catalog.put_index_options(
            &mut txn,
            &shelf.name,
            index_name,
            &IndexOptions {
                sorted_duplicates: actual_sorted_duplicates,
            },
        )?;
        txn.commit()?;

        shelf.register_index(index_name.to_string(), kind);
        tracing::debug!(shelf = %shelf.name, index = index_name, ?kind, "index opened");
        Ok(kind)
    }

    /// Closes `name`, if open. When `remove` is set, also deletes its
    /// primary database, every secondary database registered against it,
    /// and their catalog entries.
    pub fn close_shelf(&self, name: &str, remove: bool) -> StoreResult<()> {
        self.shelves.lock().unwrap().remove(name);
        if remove {
            self.env.drop_database(name)?;
            self.catalog.remove_shelf_entries(name)?;
        }
        tracing::debug!(shelf = name, remove, "shelf closed");
        Ok(())
    }

    /// `close_shelf(name, remove = true)`.
    pub fn remove_shelf(&self, name: &str) -> StoreResult<()> {
        self.close_shelf(name, true)
    }
}

/// Builds the secondary's key-derivation closure for `field`: decode the
/// primary's stored bytes as a [`Record`] and encode the field's value as an
/// ordered key. Every shelf stores [`Record`]s, so one generic key-creator
/// covers every index regardless of shape.
fn default_key_creator(field: String) -> KeyCreator {
    Arc::new(move |bytes: &[u8]| -> Option<Vec<u8>> {
        let (record, _): (Record, usize) =
            bincode::serde::decode_from_slice(bytes, bincode_config()).ok()?;
        record.get(&field).map(|v| v.encode_key())
    })
}

fn bincode_config() -> impl Config {
    config::legacy()
}
