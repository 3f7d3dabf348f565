//! Record lifecycle built atop a cupboard: instantiate a shape-described
//! record, save it, retrieve it by a unique or an any index, modify a field
//! in place, and delete it — all while the engine keeps secondary indexes
//! in sync automatically.


mod shape;
mod stream;

pub use shape::{FieldIndex, FieldSpec, Shape};
pub use stream::RetrieveStream;

use bincode::config::{self, Config};
use common::{EngineConfig, StoreError, StoreResult};
use cupboard::{Cupboard, IndexOpenOptions, Shelf};
use kvengine::IndexKind;
use std::path::Path;
use txn::RetryOptions;
use types::{Record, Value};

/// Builds a fresh record under `shape`: a new primary key, the shape's
/// unique/any index membership recorded onto [`Record::meta`], and the
/// given field values. Opens every indexed field's index on `shelf` first
/// (a no-op if already open), so secondary maintenance is wired up before
/// the record is ever saved. If `auto_save` is set, saves it before
/// returning.
pub fn make_instance(
    cupboard: &Cupboard,
    shelf: &Shelf,
    shape: &Shape,
    values: impl IntoIterator<Item = (String, Value)>,
    auto_save: bool,
) -> StoreResult<Record> {
    let mut record = Record::with_fields(values);
    record.meta.shelf_name = Some(shelf.name.clone());

    for field in &shape.fields {
        match field.index {
            FieldIndex::None => {}
            FieldIndex::Unique => {
                cupboard.get_index(
                    shelf,
                    &field.name,
                    IndexOpenOptions {
                        sorted_duplicates: Some(false),
                    },
                )?;
                record.meta.unique_indexes.insert(field.name.clone());
            }
            FieldIndex::Any => {
                cupboard.get_index(
                    shelf,
                    &field.name,
                    IndexOpenOptions {
                        sorted_duplicates: Some(true),
                    },
                )?;
                record.meta.any_indexes.insert(field.name.clone());
            }
        }
    }

    if auto_save {
        save(cupboard, shelf, &record)?;
    }
    Ok(record)
}

/// Writes `record` to `shelf`'s primary database under its own primary
/// key, through the deadlock-aware transaction supervisor. Secondary index
/// maintenance happens automatically inside the engine, keyed off whatever
/// indexes are currently open on the shelf.
pub fn save(cupboard: &Cupboard, shelf: &Shelf, record: &Record) -> StoreResult<()> {
    let key = record.primary_key().as_bytes().to_vec();
    let bytes = encode(record)?;
    txn::with_txn(cupboard.env(), RetryOptions::default(), |t| {
        t.put(&shelf.name, key.clone(), bytes.clone())
    })?;
    tracing::debug!(shelf = %shelf.name, primary_key = %record.primary_key(), "record saved");
    Ok(())
}

/// The result of a dispatched [`retrieve`]: at most one record behind a
/// unique index, or a lazy stream over every record behind an any index.
pub enum RetrieveOutcome {
    Unique(Option<Record>),
    Any(RetrieveStream),
}

/// Looks a record up by `index_name`'s value, dispatching to the unique or
/// any lookup discipline according to whatever kind that index was opened
/// as on `shelf`. Fails with [`StoreError::UnindexedField`] if `index_name`
/// isn't an open index on `shelf` at all.
pub fn retrieve(
    cupboard: &Cupboard,
    shelf: &Shelf,
    index_name: &str,
    value: &Value,
) -> StoreResult<RetrieveOutcome> {
    match shelf.index_kind(index_name) {
        Some(IndexKind::Unique) => {
            retrieve_unique(cupboard, shelf, index_name, value).map(RetrieveOutcome::Unique)
        }
        Some(IndexKind::Any) => Ok(RetrieveOutcome::Any(retrieve_any(cupboard, shelf, index_name, value)?)),
        None => Err(StoreError::UnindexedField(index_name.to_string())),
    }
}

/// Looks a record up by a unique index's value. `None` if no record has
/// that value under `index_name`. Fails with
/// [`StoreError::UnindexedField`] if `index_name` isn't indexed on `shelf`,
/// and with [`StoreError::InvalidArgument`] if it's indexed but as an any
/// (duplicate-permitting) index rather than a unique one.
pub fn retrieve_unique(
    cupboard: &Cupboard,
    shelf: &Shelf,
    index_name: &str,
    value: &Value,
) -> StoreResult<Option<Record>> {
    match shelf.index_kind(index_name) {
        Some(IndexKind::Unique) => {}
        Some(IndexKind::Any) => {
            return Err(StoreError::InvalidArgument(format!(
                "index '{index_name}' is an any index, not unique"
            )));
        }
        None => return Err(StoreError::UnindexedField(index_name.to_string())),
    }

    let secondary = catalog::index_key(&shelf.name, index_name);
    let Some(primary_key) = cupboard.env().get(&secondary, &value.encode_key()) else {
        return Ok(None);
    };
    match cupboard.env().get(&shelf.name, &primary_key) {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Opens a lazy stream over every record whose `index_name` field equals
/// `value`, for an any (duplicate-permitting) index. Fails with
/// [`StoreError::UnindexedField`] if `index_name` isn't indexed on `shelf`,
/// and with [`StoreError::InvalidArgument`] if it's indexed but as a
/// unique index rather than an any one.
pub fn retrieve_any(
    cupboard: &Cupboard,
    shelf: &Shelf,
    index_name: &str,
    value: &Value,
) -> StoreResult<RetrieveStream> {
    match shelf.index_kind(index_name) {
        Some(IndexKind::Any) => {}
        Some(IndexKind::Unique) => {
            return Err(StoreError::InvalidArgument(format!(
                "index '{index_name}' is a unique index, not any"
            )));
        }
        None => return Err(StoreError::UnindexedField(index_name.to_string())),
    }

    let secondary = catalog::index_key(&shelf.name, index_name);
    Ok(RetrieveStream::open(
        cupboard.env().clone(),
        shelf.name.clone(),
        secondary,
        value.encode_key(),
    ))
}

/// Sets `field` on a copy of `record`, preserving its primary key and
/// index membership, and saves the result.
pub fn assoc(
    cupboard: &Cupboard,
    shelf: &Shelf,
    record: &Record,
    field: impl Into<String>,
    value: Value,
) -> StoreResult<Record> {
    let mut updated = record.clone();
    updated.set(field, value);
    save(cupboard, shelf, &updated)?;
    Ok(updated)
}

/// Removes `field` from a copy of `record` and saves the result.
pub fn dissoc(cupboard: &Cupboard, shelf: &Shelf, record: &Record, field: &str) -> StoreResult<Record> {
    let mut updated = record.clone();
    updated.remove(field);
    save(cupboard, shelf, &updated)?;
    Ok(updated)
}

/// Deletes `record` from `shelf` by its primary key, through the
/// deadlock-aware transaction supervisor. Symmetric with `save`: the
/// engine's automatic secondary maintenance removes every secondary entry
/// the record contributed.
pub fn delete(cupboard: &Cupboard, shelf: &Shelf, record: &Record) -> StoreResult<()> {
    let key = record.primary_key().as_bytes().to_vec();
    txn::with_txn(cupboard.env(), RetryOptions::default(), |t| {
        t.delete(&shelf.name, key.clone())
    })?;
    tracing::debug!(shelf = %shelf.name, primary_key = %record.primary_key(), "record deleted");
    Ok(())
}

/// Opens a cupboard at `dir`, runs `body`, and closes it on every exit
/// path — including a panic unwinding through `body` — before propagating
/// whatever `body` returned or resuming the unwind.
pub fn with_open_cupboard<F, T>(dir: impl AsRef<Path>, config: EngineConfig, body: F) -> StoreResult<T>
where
    F: FnOnce(&Cupboard) -> StoreResult<T>,
{
    let cupboard = Cupboard::open(dir.as_ref().to_path_buf(), config)?;
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| body(&cupboard)));
    cupboard.close();
    match outcome {
        Ok(result) => result,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

pub(crate) fn encode(record: &Record) -> StoreResult<Vec<u8>> {
    bincode::serde::encode_to_vec(record, bincode_config())
        .map_err(|e| StoreError::Storage(format!("encoding record: {e}")))
}

pub(crate) fn decode(bytes: &[u8]) -> StoreResult<Record> {
    bincode::serde::decode_from_slice(bytes, bincode_config())
        .map(|(record, _)| record)
        .map_err(|e| StoreError::Storage(format!("decoding record: {e}")))
}

fn bincode_config() -> impl Config {
    config::legacy()
}
