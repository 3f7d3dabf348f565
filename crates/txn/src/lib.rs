//! The deadlock-aware transaction supervisor.
//!
//! [`kvengine::Txn`] only offers begin/commit/rollback; `with_txn` wraps it
//! in a bounded retry loop so a caller can write `body` once and not worry
//! about the engine reporting `Deadlock` when its writer slot is contended.


use common::{StoreError, StoreResult};
use kvengine::{Env, IsolationLevel, Txn, TxnStatus};
use std::time::Duration;

/// Options governing a `with_txn` block.
#[derive(Clone, Copy, Debug, bon::Builder)]
pub struct RetryOptions {
    #[builder(default = 1)]
    pub max_attempts: u32,
    #[builder(default = 50)]
    pub retry_delay_ms: u64,
    #[builder(default = IsolationLevel::Serializable)]
    pub isolation: IsolationLevel,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            retry_delay_ms: 50,
            isolation: IsolationLevel::Serializable,
        }
    }
}

/// Runs `body` inside a fresh transaction, retrying on `Deadlock` up to
/// `options.max_attempts` times with `options.retry_delay_ms` between
/// attempts.
///
/// Each retry is a brand-new `begin` — never a savepoint. `body` sees a
/// clean transaction every attempt; whatever it did during a rolled-back
/// attempt is gone. If `body` leaves the transaction open, the result is
/// committed; if `body` already committed or rolled back the transaction
/// itself, that decision is respected. A `Deadlock` that survives the last
/// attempt is reported as `StoreError::Storage`, matching the design's
/// "deadlock: exceeded N attempts" wrapping; every other error propagates
/// immediately without retry.
pub fn with_txn<F>(env: &Env, options: RetryOptions, mut body: F) -> StoreResult<()>
where
    F: FnMut(&mut Txn) -> StoreResult<()>,
{
    let mut attempt = 1u32;
    loop {
        let outcome = run_attempt(env, options.isolation, &mut body);

        match outcome {
            Ok(()) => return Ok(()),
            Err(StoreError::Deadlock) if attempt < options.max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts = options.max_attempts,
                    "deadlock, retrying with_txn"
                );
                attempt += 1;
                std::thread::sleep(Duration::from_millis(options.retry_delay_ms));
            }
            Err(StoreError::Deadlock) => {
                tracing::warn!(attempt, "with_txn deadlock retry budget exhausted");
                return Err(StoreError::Storage(format!(
                    "deadlock: exceeded {} attempts",
                    options.max_attempts
                )));
            }
            Err(e) => return Err(e),
        }
    }
}

fn run_attempt<F>(env: &Env, isolation: IsolationLevel, body: &mut F) -> StoreResult<()>
where
    F: FnMut(&mut Txn) -> StoreResult<()>,
{
    let mut txn = Txn::begin(env, isolation)?;
    match body(&mut txn) {
        Ok(()) => {
            if txn.status() == TxnStatus::Open {
                txn.commit()
            } else {
                Ok(())
            }
        }
        Err(e) => {
            if txn.status() == TxnStatus::Open {
                txn.rollback();
            }
            Err(e)
        }
    }
}
