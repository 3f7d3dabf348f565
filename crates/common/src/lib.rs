#[cfg(test)]
mod tests;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Canonical error type shared across the persistence layer.
///
/// Mirrors the error kinds the design calls for: a bad argument or
/// reserved name, a filesystem failure, a storage-adapter failure, a
/// detected deadlock, use of a transaction that is no longer open, and a
/// lookup against a field that was never indexed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("storage: {0}")]
    Storage(String),
    #[error("deadlock")]
    Deadlock,
    #[error("transaction is not open")]
    TransactionClosed,
    #[error("field '{0}' is not indexed")]
    UnindexedField(String),
}

/// Result alias that carries a [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

/// Runtime configuration for a cupboard and the engine backing it.
///
/// # Example
/// ```
/// use common::EngineConfig;
/// use std::path::PathBuf;
///
/// let config = EngineConfig::builder()
///     .data_dir(PathBuf::from("./my_cupboard"))
///     .wal_enabled(true)
///     .deadlock_timeout_ms(25)
///     .build();
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct EngineConfig {
    /// Directory the cupboard's environment, catalog, and shelf files live in.
    #[builder(default = PathBuf::from("./cupboard_data"))]
    pub data_dir: PathBuf,
    /// Whether the write-ahead log is consulted for crash recovery on open.
    #[builder(default = true)]
    pub wal_enabled: bool,
    /// How long a writer waits on a contended key before the engine reports
    /// `StoreError::Deadlock` rather than blocking indefinitely.
    #[builder(default = 50)]
    pub deadlock_timeout_ms: u64,
    /// Default number of attempts `with_txn` makes before giving up.
    #[builder(default = 1)]
    pub default_max_attempts: u32,
    /// Default delay between `with_txn` retry attempts.
    #[builder(default = 50)]
    pub default_retry_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cupboard_data"),
            wal_enabled: true,
            deadlock_timeout_ms: 50,
            default_max_attempts: 1,
            default_retry_delay_ms: 50,
        }
    }
}

/// Re-exports convenient for downstream crates.
pub mod prelude {
    pub use crate::{EngineConfig, StoreError, StoreResult};
}
