use crate::cursor::{Cursor, ScanBound};
use crate::env::Env;
use common::StoreResult;
use std::collections::HashSet;

/// Intersects the primary-key sets produced by a set of equality-positioned
/// secondary cursors — the engine-level primitive behind a natural join.
///
/// Each equality clause's cursor is drained fully up front (duplicate lists
/// on a secondary index are expected to be small relative to the primary
/// table) and intersected via a hash set; the result set is then yielded one
/// primary key at a time. This eager-intersect-then-stream shape mirrors how
/// an embedded engine's join cursor consumes `GET_MULTIPLE`-style duplicate
/// batches rather than interleaving comparisons key-by-key.
pub struct JoinCursor {
    matches: std::vec::IntoIter<Vec<u8>>,
}

impl JoinCursor {
    /// `clauses` is one `(index_name, equality_key)` pair per equi-join
    /// clause; all must match the same primary key for it to be yielded.
    pub fn open(env: &Env, clauses: &[(String, Vec<u8>)]) -> StoreResult<Self> {
        if clauses.is_empty() {
            return Ok(Self {
                matches: Vec::new().into_iter(),
            });
        }

        let mut sets: Vec<HashSet<Vec<u8>>> = Vec::with_capacity(clauses.len());
        for (index_name, key) in clauses {
            let mut cursor = Cursor::open(env, index_name.clone(), ScanBound::exact(key.clone()));
            let mut set = HashSet::new();
            while let Some((_, primary_key)) = cursor.next()? {
                set.insert(primary_key);
            }
            cursor.close();
            sets.push(set);
        }

        sets.sort_by_key(|s| s.len());
        let mut iter = sets.into_iter();
        let mut result: HashSet<Vec<u8>> = iter.next().unwrap_or_default();
        for set in iter {
            result.retain(|k| set.contains(k));
        }

        let mut matches: Vec<Vec<u8>> = result.into_iter().collect();
        matches.sort();
        Ok(Self {
            matches: matches.into_iter(),
        })
    }

    pub fn next(&mut self) -> Option<Vec<u8>> {
        self.matches.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::txn::{IsolationLevel, Txn};
    use common::EngineConfig;
    use tempfile::tempdir;

    fn test_env() -> Env {
        let dir = tempdir().unwrap();
        let config = EngineConfig::builder()
            .data_dir(dir.path().to_path_buf())
            .build();
        let env = Env::open(config).unwrap();
        std::mem::forget(dir);
        env
    }

    #[test]
    fn join_cursor_intersects_equality_clauses() {
        let env = test_env();
        env.ensure_database("by_genre", true).unwrap();
        env.ensure_database("by_year", true).unwrap();

        let mut txn = Txn::begin(&env, IsolationLevel::Serializable).unwrap();
        txn.put("by_genre", b"scifi".to_vec(), vec![1]).unwrap();
        txn.put("by_genre", b"scifi".to_vec(), vec![2]).unwrap();
        txn.put("by_year", b"1965".to_vec(), vec![1]).unwrap();
        txn.put("by_year", b"1965".to_vec(), vec![3]).unwrap();
        txn.commit().unwrap();

        let mut join = JoinCursor::open(
            &env,
            &[
                ("by_genre".into(), b"scifi".to_vec()),
                ("by_year".into(), b"1965".to_vec()),
            ],
        )
        .unwrap();
        assert_eq!(join.next(), Some(vec![1]));
        assert_eq!(join.next(), None);
    }
}
