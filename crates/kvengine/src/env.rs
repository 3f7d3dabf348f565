use crate::database::{Database, KeyCreator, SecondaryDef, IndexKind};
use crate::wal::{Wal, WalRecord};
use bincode::config;
use common::{EngineConfig, StoreError, StoreResult};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// A cheaply-cloneable handle to an open storage environment.
///
/// Every clone shares the same registry of open databases, the same WAL and
/// the same writer slot, mirroring the handle-style `Env` of an embedded
/// engine: opening it once and cloning the handle is the normal way to pass
/// it to cursors, transactions and background maintenance.
#[derive(Clone)]
pub struct Env {
    pub(crate) dir: PathBuf,
    pub(crate) config: EngineConfig,
    pub(crate) databases: Arc<RwLock<HashMap<String, Database>>>,
    pub(crate) wal: Arc<Mutex<Wal>>,
    pub(crate) writer: Arc<Mutex<Option<u64>>>,
    pub(crate) next_txn_id: Arc<AtomicU64>,
}

fn db_file(dir: &PathBuf, name: &str) -> PathBuf {
    dir.join(format!("{name}.kvdb"))
}

impl Env {
    /// Opens (creating if absent) the environment rooted at `config.data_dir`,
    /// loading every `*.kvdb` file found there and replaying any WAL records
    /// written since the last clean flush.
    pub fn open(engine_config: EngineConfig) -> StoreResult<Self> {
        fs::create_dir_all(&engine_config.data_dir)?;
        let dir = engine_config.data_dir.clone();

        let mut databases = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("kvdb") {
                let name = path.file_stem().unwrap().to_string_lossy().to_string();
                let bytes = fs::read(&path)?;
                let (db, _): (Database, usize) =
                    bincode::serde::decode_from_slice(&bytes, config_bincode())
                        .map_err(|e| StoreError::Storage(format!("loading database {name}: {e}")))?;
                databases.insert(name, db);
            }
        }

        let wal_path = dir.join("_cupboard.wal");
        let mut wal = Wal::open(&wal_path)?;

        if engine_config.wal_enabled {
            let records = Wal::replay(&wal_path)?;
            for record in records {
                tracing::debug!(?record, "replaying wal record on open");
                apply_record(&mut databases, record);
            }
            for (name, db) in databases.iter() {
                flush_database(&dir, name, db)?;
            }
            wal.truncate()?;
        }

        tracing::debug!(dir = %dir.display(), "environment opened");

        Ok(Self {
            dir,
            config: engine_config,
            databases: Arc::new(RwLock::new(databases)),
            wal: Arc::new(Mutex::new(wal)),
            writer: Arc::new(Mutex::new(None)),
            next_txn_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Names of every database currently registered, primary or secondary.
    pub fn database_names(&self) -> Vec<String> {
        let databases = self.databases.read().unwrap();
        let mut names: Vec<String> = databases.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.databases.read().unwrap().contains_key(name)
    }

    /// The live `sorted_duplicates` setting of an open database — ground
    /// truth for a secondary's duplicate policy, since an existing
    /// database's actual configuration wins over whatever a caller asks for
    /// on a subsequent open.
    pub fn database_sorted_duplicates(&self, name: &str) -> Option<bool> {
        self.databases
            .read()
            .unwrap()
            .get(name)
            .map(|d| d.sorted_duplicates)
    }

    /// Creates a primary database if it does not already exist. Idempotent.
    ///
    /// Flushes the (empty) database to disk immediately, rather than
    /// waiting for its first `put`: a shelf with zero rows must still have
    /// a `.kvdb` file, or it would silently disappear from `database_names`
    /// on the next `Env::open`.
    pub fn ensure_database(&self, name: &str, sorted_duplicates: bool) -> StoreResult<()> {
        let mut databases = self.databases.write().unwrap();
        if databases.contains_key(name) {
            return Ok(());
        }
        let db = Database::new(name, sorted_duplicates);
        flush_database(&self.dir, name, &db)?;
        databases.insert(name.to_string(), db);
        tracing::debug!(db = name, "database created");
        Ok(())
    }

    /// Reads a single value outside any transaction — the adapter's plain
    /// `db-get`, used by callers (like the catalog) that don't need
    /// transactional isolation for a lookup.
    pub fn get(&self, db: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.databases
            .read()
            .unwrap()
            .get(db)
            .and_then(|d| d.get(key))
            .cloned()
    }

    /// Registers a secondary database against `primary`, deriving keys with
    /// `key_creator`. Existing records in `primary` are indexed immediately
    /// so the secondary starts consistent.
    pub fn create_secondary(
        &self,
        primary: &str,
        secondary: &str,
        kind: IndexKind,
        key_creator: KeyCreator,
    ) -> StoreResult<()> {
        let mut databases = self.databases.write().unwrap();
        if !databases.contains_key(primary) {
            return Err(StoreError::InvalidArgument(format!(
                "cannot create secondary {secondary}: primary {primary} does not exist"
            )));
        }
        let sorted_duplicates = kind == IndexKind::Any;
        let mut sec_db = Database::new(secondary, sorted_duplicates);

        let entries: Vec<(Vec<u8>, Vec<u8>)> = databases[primary]
            .data
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.clone(), v.clone())))
            .collect();
        for (primary_key, value) in &entries {
            if let Some(sec_key) = key_creator(value) {
                if kind == IndexKind::Unique && !sec_db.get_all(&sec_key).is_empty() {
                    return Err(StoreError::InvalidArgument(format!(
                        "unique index {secondary} violated while backfilling"
                    )));
                }
                sec_db.raw_put(sec_key, primary_key.clone());
            }
        }

        flush_database(&self.dir, secondary, &sec_db)?;
        databases.insert(secondary.to_string(), sec_db);
        attach_secondary_locked(&mut databases, primary, secondary, kind, key_creator)?;
        tracing::debug!(primary, secondary, "secondary index created");
        Ok(())
    }

    /// (Re-)registers `key_creator` for an already-existing secondary
    /// against `primary`, without touching its stored data.
    ///
    /// A primary's `secondaries` list (and the `KeyCreator` closures it
    /// carries) can't survive serialization — `Database`'s manual
    /// `Deserialize` impl always loads it empty — so every open of an
    /// index whose secondary database already exists on disk must call
    /// this to restore automatic maintenance, not just the first creation.
    pub fn attach_secondary(
        &self,
        primary: &str,
        secondary: &str,
        kind: IndexKind,
        key_creator: KeyCreator,
    ) -> StoreResult<()> {
        let mut databases = self.databases.write().unwrap();
        attach_secondary_locked(&mut databases, primary, secondary, kind, key_creator)
    }

    pub fn secondary_names(&self, primary: &str) -> Vec<String> {
        self.databases
            .read()
            .unwrap()
            .get(primary)
            .map(|db| db.secondaries.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Drops a database and, if it is a primary, every secondary registered
    /// against it.
    pub fn drop_database(&self, name: &str) -> StoreResult<()> {
        let mut databases = self.databases.write().unwrap();
        let Some(db) = databases.remove(name) else {
            return Ok(());
        };
        for secondary in &db.secondaries {
            databases.remove(&secondary.name);
            let _ = fs::remove_file(db_file(&self.dir, &secondary.name));
        }
        let _ = fs::remove_file(db_file(&self.dir, name));
        tracing::debug!(db = name, "database dropped");
        Ok(())
    }

    /// Acquires the single writer slot, retrying until `deadlock_timeout_ms`
    /// elapses. This is a timeout-based substitute for a full wait-for-graph
    /// deadlock detector: adequate for a single-writer engine, where the
    /// only thing a writer can ever wait on is another writer.
    pub(crate) fn acquire_writer(&self, txn_id: u64) -> StoreResult<()> {
        let start = Instant::now();
        let timeout = Duration::from_millis(self.config.deadlock_timeout_ms);
        loop {
            {
                let mut writer = self.writer.lock().unwrap();
                if writer.is_none() {
                    *writer = Some(txn_id);
                    return Ok(());
                }
            }
            if start.elapsed() >= timeout {
                tracing::warn!(txn_id, "timed out waiting for writer slot, reporting deadlock");
                return Err(StoreError::Deadlock);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub(crate) fn release_writer(&self, txn_id: u64) {
        let mut writer = self.writer.lock().unwrap();
        if *writer == Some(txn_id) {
            *writer = None;
        }
    }

    pub(crate) fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn append_wal(&self, record: &WalRecord) -> StoreResult<()> {
        if !self.config.wal_enabled {
            return Ok(());
        }
        let mut wal = self.wal.lock().unwrap();
        wal.append(record)?;
        wal.sync()
    }

    pub(crate) fn truncate_wal(&self) -> StoreResult<()> {
        if !self.config.wal_enabled {
            return Ok(());
        }
        self.wal.lock().unwrap().truncate()
    }

    pub(crate) fn with_databases_read<T>(
        &self,
        f: impl FnOnce(&HashMap<String, Database>) -> T,
    ) -> T {
        f(&self.databases.read().unwrap())
    }

    /// Applies a committed put to `primary` and every secondary registered
    /// against it, then flushes both to disk.
    pub(crate) fn apply_put(&self, primary: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut databases = self.databases.write().unwrap();
        let secondaries = databases
            .get(primary)
            .map(|db| db.secondaries.clone())
            .unwrap_or_default();

        let old_value = databases.get(primary).and_then(|db| db.get(key)).cloned();

        for secondary in &secondaries {
            if let Some(old) = &old_value {
                if let Some(old_key) = (secondary.key_creator)(old) {
                    if let Some(sec_db) = databases.get_mut(&secondary.name) {
                        sec_db.raw_delete_value(&old_key, key);
                    }
                }
            }
        }
        for secondary in &secondaries {
            if let Some(new_key) = (secondary.key_creator)(value) {
                if let Some(sec_db) = databases.get_mut(&secondary.name) {
                    if secondary.kind == IndexKind::Unique {
                        let existing = sec_db.get_all(&new_key);
                        if existing.iter().any(|pk| pk != key) {
                            return Err(StoreError::InvalidArgument(format!(
                                "unique index {} violated",
                                secondary.name
                            )));
                        }
                    }
                    sec_db.raw_put(new_key, key.to_vec());
                }
            }
        }

        let primary_db = databases
            .get_mut(primary)
            .ok_or_else(|| StoreError::InvalidArgument(format!("no such database {primary}")))?;
        primary_db.raw_put(key.to_vec(), value.to_vec());

        flush_database(&self.dir, primary, &databases[primary])?;
        for secondary in &secondaries {
            flush_database(&self.dir, &secondary.name, &databases[&secondary.name])?;
        }
        Ok(())
    }

    /// Applies a committed delete to `primary` and every secondary
    /// registered against it, then flushes both to disk.
    pub(crate) fn apply_delete(&self, primary: &str, key: &[u8]) -> StoreResult<()> {
        let mut databases = self.databases.write().unwrap();
        let secondaries = databases
            .get(primary)
            .map(|db| db.secondaries.clone())
            .unwrap_or_default();

        let old_value = databases.get(primary).and_then(|db| db.get(key)).cloned();

        if let Some(old) = &old_value {
            for secondary in &secondaries {
                if let Some(old_key) = (secondary.key_creator)(old) {
                    if let Some(sec_db) = databases.get_mut(&secondary.name) {
                        sec_db.raw_delete_value(&old_key, key);
                    }
                }
            }
        }

        if let Some(primary_db) = databases.get_mut(primary) {
            primary_db.raw_delete(key);
            flush_database(&self.dir, primary, &databases[primary])?;
        }
        for secondary in &secondaries {
            if let Some(sec_db) = databases.get(&secondary.name) {
                flush_database(&self.dir, &secondary.name, sec_db)?;
            }
        }
        Ok(())
    }
}

/// Replaces (if present) and re-adds `secondary`'s [`SecondaryDef`] on
/// `primary`'s secondaries list, so reattaching a key-creator is idempotent
/// across repeated opens of the same index.
fn attach_secondary_locked(
    databases: &mut HashMap<String, Database>,
    primary: &str,
    secondary: &str,
    kind: IndexKind,
    key_creator: KeyCreator,
) -> StoreResult<()> {
    let primary_db = databases.get_mut(primary).ok_or_else(|| {
        StoreError::InvalidArgument(format!(
            "cannot attach secondary {secondary}: primary {primary} does not exist"
        ))
    })?;
    primary_db.secondaries.retain(|s| s.name != secondary);
    primary_db.add_secondary(SecondaryDef {
        name: secondary.to_string(),
        kind,
        key_creator,
    });
    Ok(())
}

fn apply_record(databases: &mut HashMap<String, Database>, record: WalRecord) {
    match record {
        WalRecord::CreateDatabase {
            name,
            sorted_duplicates,
        } => {
            databases
                .entry(name.clone())
                .or_insert_with(|| Database::new(&name, sorted_duplicates));
        }
        WalRecord::Put { db, key, value } => {
            if let Some(database) = databases.get_mut(&db) {
                database.raw_put(key, value);
            }
        }
        WalRecord::Delete { db, key } => {
            if let Some(database) = databases.get_mut(&db) {
                database.raw_delete(&key);
            }
        }
    }
}

fn flush_database(dir: &PathBuf, name: &str, db: &Database) -> StoreResult<()> {
    let bytes = bincode::serde::encode_to_vec(db, config_bincode())
        .map_err(|e| StoreError::Storage(format!("encoding database {name}: {e}")))?;
    fs::write(db_file(dir, name), bytes)?;
    Ok(())
}

fn config_bincode() -> impl config::Config {
    config::legacy()
}

impl serde::Serialize for Database {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Database", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("sorted_duplicates", &self.sorted_duplicates)?;
        state.serialize_field("data", &self.data)?;
        state.end()
    }
}

impl<'de> serde::Deserialize<'de> for Database {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Raw {
            name: String,
            sorted_duplicates: bool,
            data: std::collections::BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Database {
            name: raw.name,
            sorted_duplicates: raw.sorted_duplicates,
            data: raw.data,
            secondaries: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::{IsolationLevel, Txn};
    use tempfile::tempdir;

    #[test]
    fn ensure_database_flushes_a_file_immediately_even_with_zero_rows() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::builder().data_dir(dir.path().to_path_buf()).build();
        let env = Env::open(config.clone()).unwrap();
        env.ensure_database("books", false).unwrap();

        assert!(dir.path().join("books.kvdb").exists());

        let reopened = Env::open(config).unwrap();
        assert_eq!(reopened.database_names(), vec!["books".to_string()]);
    }

    #[test]
    fn reopening_an_environment_with_an_existing_secondary_reattaches_the_key_creator() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::builder().data_dir(dir.path().to_path_buf()).build();
        let env = Env::open(config.clone()).unwrap();
        env.ensure_database("books", false).unwrap();
        env.create_secondary(
            "books",
            "books:isbn",
            IndexKind::Unique,
            Arc::new(|value: &[u8]| Some(value.to_vec())),
        )
        .unwrap();

        // Simulate a close and reopen: a fresh `Env` loads both databases
        // straight from their `.kvdb` files, so the primary's `secondaries`
        // list comes back empty regardless of what was registered before.
        let reopened = Env::open(config).unwrap();
        assert!(reopened.secondary_names("books").is_empty());

        reopened
            .attach_secondary(
                "books",
                "books:isbn",
                IndexKind::Unique,
                Arc::new(|value: &[u8]| Some(value.to_vec())),
            )
            .unwrap();
        assert_eq!(reopened.secondary_names("books"), vec!["books:isbn".to_string()]);

        let mut txn = Txn::begin(&reopened, IsolationLevel::Serializable).unwrap();
        txn.put("books", b"1".to_vec(), b"dune".to_vec()).unwrap();
        txn.commit().unwrap();

        assert_eq!(reopened.get("books:isbn", b"dune"), Some(b"1".to_vec()));
    }
}
