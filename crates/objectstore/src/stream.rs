use common::StoreResult;
use kvengine::{Cursor, Env, ScanBound};
use types::Record;

/// A lazy stream over every record matching an `any` index's duplicate
/// list for a single value. Exhausting the stream, or dropping it early,
/// closes the underlying cursor.
pub struct RetrieveStream {
    cursor: Cursor,
    shelf: String,
    env: Env,
}

impl RetrieveStream {
    pub(crate) fn open(env: Env, shelf: String, secondary: String, key: Vec<u8>) -> Self {
        let cursor = Cursor::open(&env, secondary, ScanBound::exact(key));
        Self { cursor, shelf, env }
    }

    /// Returns the next matching record, decoded from the shelf's primary
    /// database, or `None` once the duplicate list is exhausted.
    pub fn next(&mut self) -> StoreResult<Option<Record>> {
        loop {
            let Some((_, primary_key)) = self.cursor.next()? else {
                return Ok(None);
            };
            if let Some(bytes) = self.env.get(&self.shelf, &primary_key) {
                return Ok(Some(crate::decode(&bytes)?));
            }
        }
    }

    pub fn close(&mut self) {
        self.cursor.close();
    }
}
