use crate::env::Env;
use crate::wal::WalRecord;
use common::{StoreError, StoreResult};

/// Recorded but not enforced beyond serializing all writers — see the
/// `Env::acquire_writer` doc comment for why a single-writer engine doesn't
/// need per-level concurrency control to honor any of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    Serializable,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::Serializable
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnStatus {
    Open,
    Committed,
    Aborted,
}

#[derive(Clone, Debug)]
enum PendingOp {
    Put { db: String, key: Vec<u8>, value: Vec<u8> },
    Delete { db: String, key: Vec<u8> },
}

/// A transaction against an [`Env`]. Begins by claiming the environment's
/// single writer slot (waiting up to `deadlock_timeout_ms` before reporting
/// [`StoreError::Deadlock`]), buffers its puts and deletes, and applies them
/// to the databases involved — with full secondary-index maintenance — only
/// on [`Txn::commit`].
pub struct Txn {
    id: u64,
    env: Env,
    status: TxnStatus,
    isolation: IsolationLevel,
    parent: Option<u64>,
    pending: Vec<PendingOp>,
}

impl Txn {
    pub fn begin(env: &Env, isolation: IsolationLevel) -> StoreResult<Self> {
        Self::begin_nested(env, isolation, None)
    }

    /// Begins a transaction nested under `parent`'s id. Nesting is recorded
    /// for observability only: the writer slot is still per-environment, so
    /// a nested transaction still serializes with every other writer.
    pub fn begin_nested(
        env: &Env,
        isolation: IsolationLevel,
        parent: Option<&Txn>,
    ) -> StoreResult<Self> {
        let id = env.next_txn_id();
        env.acquire_writer(id)?;
        tracing::trace!(txn_id = id, ?isolation, "transaction begin");
        Ok(Self {
            id,
            env: env.clone(),
            status: TxnStatus::Open,
            isolation,
            parent: parent.map(|p| p.id),
            pending: Vec::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> TxnStatus {
        self.status
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn parent(&self) -> Option<u64> {
        self.parent
    }

    fn require_open(&self) -> StoreResult<()> {
        if self.status != TxnStatus::Open {
            return Err(StoreError::TransactionClosed);
        }
        Ok(())
    }

    /// Reads `key` from `db`, honoring this transaction's own uncommitted
    /// writes before falling back to the last committed value.
    pub fn get(&self, db: &str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.require_open()?;
        for op in self.pending.iter().rev() {
            match op {
                PendingOp::Put { db: d, key: k, value } if d == db && k.as_slice() == key => {
                    return Ok(Some(value.clone()));
                }
                PendingOp::Delete { db: d, key: k } if d == db && k.as_slice() == key => {
                    return Ok(None);
                }
                _ => {}
            }
        }
        Ok(self
            .env
            .with_databases_read(|dbs| dbs.get(db).and_then(|d| d.get(key)).cloned()))
    }

    pub fn put(&mut self, db: impl Into<String>, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        self.require_open()?;
        self.pending.push(PendingOp::Put {
            db: db.into(),
            key,
            value,
        });
        Ok(())
    }

    pub fn delete(&mut self, db: impl Into<String>, key: Vec<u8>) -> StoreResult<()> {
        self.require_open()?;
        self.pending.push(PendingOp::Delete {
            db: db.into(),
            key,
        });
        Ok(())
    }

    pub fn commit(mut self) -> StoreResult<()> {
        self.require_open()?;
        let result = self.apply_and_flush();
        self.env.release_writer(self.id);
        self.status = match &result {
            Ok(()) => TxnStatus::Committed,
            Err(_) => TxnStatus::Aborted,
        };
        tracing::trace!(txn_id = self.id, ok = result.is_ok(), "transaction commit");
        result
    }

    fn apply_and_flush(&mut self) -> StoreResult<()> {
        for op in &self.pending {
            let record = match op {
                PendingOp::Put { db, key, value } => WalRecord::Put {
                    db: db.clone(),
                    key: key.clone(),
                    value: value.clone(),
                },
                PendingOp::Delete { db, key } => WalRecord::Delete {
                    db: db.clone(),
                    key: key.clone(),
                },
            };
            self.env.append_wal(&record)?;
        }
        for op in self.pending.drain(..) {
            match op {
                PendingOp::Put { db, key, value } => self.env.apply_put(&db, &key, &value)?,
                PendingOp::Delete { db, key } => self.env.apply_delete(&db, &key)?,
            }
        }
        self.env.truncate_wal()
    }

    pub fn rollback(mut self) {
        self.pending.clear();
        self.env.release_writer(self.id);
        self.status = TxnStatus::Aborted;
        tracing::trace!(txn_id = self.id, "transaction rollback");
    }
}

impl Drop for Txn {
    fn drop(&mut self) {
        if self.status == TxnStatus::Open {
            tracing::warn!(txn_id = self.id, "transaction dropped without commit/rollback, auto-aborting");
            self.env.release_writer(self.id);
        }
    }
}
