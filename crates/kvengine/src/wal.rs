//! Redo-only write-ahead log for the engine's byte-oriented mutations.
//!
//! Grounded in the same length-prefixed, fsync-after-batch design as a
//! conventional single-writer WAL: every record is bincode-encoded, framed
//! with a 4-byte little-endian length, and appended before the mutation is
//! applied to the in-memory database and flushed to disk. `replay` is only
//! ever used to recover records written since the last successful flush.

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use common::StoreError;
use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
};

/// A logical mutation recorded before it is applied to a database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WalRecord {
    Put {
        db: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        db: String,
        key: Vec<u8>,
    },
    CreateDatabase {
        name: String,
        sorted_duplicates: bool,
    },
}

#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    file: File,
}

impl Wal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::Storage(format!("opening wal: {e}")))?;
        Ok(Self { path, file })
    }

    pub fn append(&mut self, rec: &WalRecord) -> Result<(), StoreError> {
        let bytes = encode_to_vec(rec, bincode_config())
            .map_err(|e| StoreError::Storage(format!("encoding wal record: {e}")))?;
        let len = bytes.len() as u32;
        self.file
            .write_all(&len.to_le_bytes())
            .map_err(|e| StoreError::Storage(format!("writing wal length prefix: {e}")))?;
        self.file
            .write_all(&bytes)
            .map_err(|e| StoreError::Storage(format!("writing wal record: {e}")))?;
        self.file
            .flush()
            .map_err(|e| StoreError::Storage(format!("flushing wal: {e}")))?;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<(), StoreError> {
        self.file
            .sync_all()
            .map_err(|e| StoreError::Storage(format!("fsyncing wal: {e}")))
    }

    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<WalRecord>, StoreError> {
        let mut file = match OpenOptions::new().read(true).open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Storage(format!("opening wal for replay: {e}"))),
        };

        let mut records = Vec::new();
        loop {
            let mut len_buf = [0u8; 4];
            match file.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(StoreError::Storage(format!(
                        "reading wal length prefix: {e}"
                    )));
                }
            }
            let len = u32::from_le_bytes(len_buf);
            let mut buf = vec![0u8; len as usize];
            if file.read_exact(&mut buf).is_err() {
                // Truncated trailing record from a crash mid-append; stop here.
                break;
            }
            match decode_from_slice(&buf, bincode_config()) {
                Ok((rec, _)) => records.push(rec),
                Err(_) => break,
            }
        }
        Ok(records)
    }

    pub fn truncate(&mut self) -> Result<(), StoreError> {
        drop(std::mem::replace(
            &mut self.file,
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)
                .map_err(|e| StoreError::Storage(format!("truncating wal: {e}")))?,
        ));
        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| StoreError::Storage(format!("reopening wal after truncate: {e}")))?;
        Ok(())
    }
}

fn bincode_config() -> impl Config {
    config::legacy()
}
