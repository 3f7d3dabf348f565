//! Clause classification and the two query execution strategies: a
//! natural-join over exact-match cursors, and a range-join that scans one
//! dominating clause's index and filters every candidate by all clauses.

#[cfg(test)]
mod tests;

use bincode::config::{self, Config};
use common::{StoreError, StoreResult};
use cupboard::{Cupboard, IndexOpenOptions, Shelf};
use kvengine::{Cursor, Env, JoinCursor, ScanBound};
use std::cmp::Ordering;
use std::ops::Bound;
use types::{Record, Value};

/// A binary predicate symbol, per clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn matches(self, candidate: &Value, target: &Value) -> bool {
        let Some(ordering) = candidate.cmp_same_type(target) else {
            return false;
        };
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Lt => ordering == Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::Ge => ordering != Ordering::Less,
        }
    }
}

/// One `(index, op, value)` term of a query.
#[derive(Clone, Debug)]
pub struct Clause {
    pub index_name: String,
    pub op: Op,
    pub value: Value,
}

impl Clause {
    pub fn new(index_name: impl Into<String>, op: Op, value: Value) -> Self {
        Self {
            index_name: index_name.into(),
            op,
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockMode {
    #[default]
    ReadUncommitted,
    ReadCommitted,
}

/// Per-query overrides. `limit` bounds how many records the driver
/// materializes before closing its cursor; `lock_mode` is accepted for API
/// fidelity but doesn't currently change read behavior — the engine has no
/// MVCC, so every read already sees the latest committed state.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    pub lock_mode: LockMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    NaturalJoin,
    RangeJoin,
}

/// Natural-join iff every clause is an equality clause; otherwise
/// range-join. The source's literal condition additionally required the
/// query's callback to be `identity`; this implementation takes the
/// relaxed reading the design notes prefer.
fn choose_strategy(clauses: &[Clause]) -> Strategy {
    if clauses.iter().all(|c| c.op == Op::Eq) {
        Strategy::NaturalJoin
    } else {
        Strategy::RangeJoin
    }
}

/// Runs a query against `shelf`, opening any clause's index that isn't
/// already open, then dispatching to the natural-join or range-join
/// executor. Every returned record is decorated with its shelf name.
pub fn query(
    cupboard: &Cupboard,
    shelf: &Shelf,
    clauses: &[Clause],
    options: QueryOptions,
) -> StoreResult<Vec<Record>> {
    if clauses.is_empty() {
        return Err(StoreError::InvalidArgument(
            "query requires at least one clause".into(),
        ));
    }
    for clause in clauses {
        cupboard.get_index(shelf, &clause.index_name, IndexOpenOptions::default())?;
    }

    let strategy = choose_strategy(clauses);
    tracing::debug!(shelf = %shelf.name, clauses = clauses.len(), ?strategy, "query dispatched");
    match strategy {
        Strategy::NaturalJoin => natural_join(cupboard.env(), shelf, clauses, options),
        Strategy::RangeJoin => range_join(cupboard.env(), shelf, clauses, options),
    }
}

fn natural_join(
    env: &Env,
    shelf: &Shelf,
    clauses: &[Clause],
    options: QueryOptions,
) -> StoreResult<Vec<Record>> {
    let join_clauses: Vec<(String, Vec<u8>)> = clauses
        .iter()
        .map(|c| (catalog::index_key(&shelf.name, &c.index_name), c.value.encode_key()))
        .collect();

    let mut join_cursor = JoinCursor::open(env, &join_clauses)?;
    let mut results = Vec::new();
    while let Some(primary_key) = join_cursor.next() {
        if options.limit.is_some_and(|limit| results.len() >= limit) {
            break;
        }
        if let Some(bytes) = env.get(&shelf.name, &primary_key) {
            results.push(decode_and_decorate(&bytes, &shelf.name)?);
        }
    }
    Ok(results)
}

fn range_join(
    env: &Env,
    shelf: &Shelf,
    clauses: &[Clause],
    options: QueryOptions,
) -> StoreResult<Vec<Record>> {
    // The first clause is the dominating clause: a known simplification the
    // source admits to (see the design notes on selectivity estimation).
    let dominating = &clauses[0];
    let index_db = catalog::index_key(&shelf.name, &dominating.index_name);
    let bound = scan_bound_for(dominating.op, dominating.value.encode_key());

    let mut cursor = Cursor::open(env, index_db, bound);
    let mut results = Vec::new();
    while let Some((_, primary_key)) = cursor.next()? {
        if options.limit.is_some_and(|limit| results.len() >= limit) {
            break;
        }
        let Some(bytes) = env.get(&shelf.name, &primary_key) else {
            continue;
        };
        let record = decode_and_decorate(&bytes, &shelf.name)?;
        let satisfies_all = clauses.iter().all(|clause| {
            record
                .get(&clause.index_name)
                .map(|v| clause.op.matches(v, &clause.value))
                .unwrap_or(false)
        });
        if satisfies_all {
            results.push(record);
        }
    }
    cursor.close();
    Ok(results)
}

fn scan_bound_for(op: Op, key: Vec<u8>) -> ScanBound {
    match op {
        Op::Eq => ScanBound::exact(key),
        Op::Ge => ScanBound::range(Bound::Included(key), Bound::Unbounded),
        Op::Gt => ScanBound::range(Bound::Excluded(key), Bound::Unbounded),
        Op::Le => ScanBound::range(Bound::Unbounded, Bound::Included(key)),
        Op::Lt => ScanBound::range(Bound::Unbounded, Bound::Excluded(key)),
    }
}

fn decode_and_decorate(bytes: &[u8], shelf_name: &str) -> StoreResult<Record> {
    let (mut record, _): (Record, usize) = bincode::serde::decode_from_slice(bytes, bincode_config())
        .map_err(|e| StoreError::Storage(format!("decoding record: {e}")))?;
    if record.meta.shelf_name.is_none() {
        record.meta.shelf_name = Some(shelf_name.to_string());
    }
    Ok(record)
}

fn bincode_config() -> impl Config {
    config::legacy()
}
