use crate::env::Env;
use common::StoreResult;
use std::ops::Bound;

/// The range a cursor walks. `Exact` positions on a single key (and, on a
/// `sorted_duplicates` database, walks every value under it); `Range` walks
/// keys between optional bounds in ascending order.
#[derive(Clone, Debug)]
pub enum ScanBound {
    Exact(Vec<u8>),
    Range {
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
    },
    All,
}

impl ScanBound {
    pub fn all() -> Self {
        ScanBound::All
    }

    pub fn exact(key: Vec<u8>) -> Self {
        ScanBound::Exact(key)
    }

    pub fn range(start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Self {
        ScanBound::Range { start, end }
    }
}

/// A lazily-advancing, explicitly-closeable iterator over one database.
///
/// Each call to [`Cursor::next`] takes a brief read lock on the
/// environment's database registry to fetch the next matching entry — no
/// upfront materialization of the whole range. [`Cursor::close`] is
/// idempotent and also runs on `Drop`, so a cursor dropped on an early
/// return (an error, a `break`) still releases cleanly.
pub struct Cursor {
    env: Env,
    db_name: String,
    bound: ScanBound,
    last_key: Option<Vec<u8>>,
    dup_index: usize,
    exhausted: bool,
    closed: bool,
}

impl Cursor {
    pub fn open(env: &Env, db_name: impl Into<String>, bound: ScanBound) -> Self {
        Self {
            env: env.clone(),
            db_name: db_name.into(),
            bound,
            last_key: None,
            dup_index: 0,
            exhausted: false,
            closed: false,
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Returns the next `(key, value)` pair in ascending order, or `None`
    /// once the bound is exhausted or the cursor has been closed.
    pub fn next(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        if self.closed || self.exhausted {
            return Ok(None);
        }

        let result = self.env.with_databases_read(|dbs| {
            let Some(db) = dbs.get(&self.db_name) else {
                return None;
            };

            match &self.bound {
                ScanBound::Exact(key) => {
                    let values = db.get_all(key);
                    if self.dup_index < values.len() {
                        let value = values[self.dup_index].clone();
                        self.dup_index += 1;
                        Some((key.clone(), value))
                    } else {
                        None
                    }
                }
                ScanBound::Range { start, end } => {
                    let lower = match (&self.last_key, start) {
                        (Some(last), _) => Bound::Excluded(last.clone()),
                        (None, s) => s.clone(),
                    };
                    db.data
                        .range((lower, end.clone()))
                        .next()
                        .map(|(k, values)| (k.clone(), values[0].clone()))
                }
                ScanBound::All => {
                    let lower = match &self.last_key {
                        Some(last) => Bound::Excluded(last.clone()),
                        None => Bound::Unbounded,
                    };
                    db.data
                        .range((lower, Bound::Unbounded))
                        .next()
                        .map(|(k, values)| (k.clone(), values[0].clone()))
                }
            }
        });

        match result {
            Some((key, value)) => {
                if !matches!(self.bound, ScanBound::Exact(_)) {
                    self.last_key = Some(key.clone());
                }
                Ok(Some((key, value)))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}
