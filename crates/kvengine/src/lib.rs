//! A pure-Rust, single-writer embedded key-value engine.
//!
//! This is the concrete storage adapter the rest of the workspace is built
//! on: an [`Env`] owns a directory of ordered [`Database`]s (primary and
//! secondary), a redo-only WAL, and a single writer slot. [`Txn`] is the
//! unit of atomicity; [`Cursor`] and [`JoinCursor`] are the read-side
//! primitives a query layer composes into scans and joins.
//!
//! # Example
//! ```no_run
//! use common::EngineConfig;
//! use kvengine::{Env, Txn, IsolationLevel};
//!
//! let env = Env::open(EngineConfig::default()).unwrap();
//! env.ensure_database("books", false).unwrap();
//!
//! let mut txn = Txn::begin(&env, IsolationLevel::Serializable).unwrap();
//! txn.put("books", b"1".to_vec(), b"dune".to_vec()).unwrap();
//! txn.commit().unwrap();
//! ```

mod cursor;
mod database;
mod env;
mod join_cursor;
mod txn;
mod wal;

pub use cursor::{Cursor, ScanBound};
pub use database::{Database, IndexKind, KeyCreator, SecondaryDef};
pub use env::Env;
pub use join_cursor::JoinCursor;
pub use txn::{IsolationLevel, Txn, TxnStatus};
pub use wal::{Wal, WalRecord};
