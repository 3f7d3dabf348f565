//! Shared fixtures for this workspace's integration tests: a scratch
//! cupboard rooted in a fresh temp directory, and the "Book" shape used
//! across the canonical scenarios (unique `isbn`, any `title`, plain
//! `year`).

use common::EngineConfig;
use cupboard::{Cupboard, Shelf, ShelfOpenOptions};
use objectstore::{FieldIndex, Shape};
use std::sync::Arc;
use tempfile::TempDir;
use types::Value;

/// Opens a fresh cupboard rooted at a new temporary directory. The
/// directory is leaked for the cupboard's lifetime — `Cupboard` only
/// stores the path, not a `TempDir` guard, so the guard must outlive it.
pub fn temp_cupboard() -> Cupboard {
    let dir = TempDir::new().expect("create temp dir");
    let config = EngineConfig::builder()
        .data_dir(dir.path().to_path_buf())
        .build();
    let cupboard = Cupboard::open(dir.path(), config).expect("open cupboard");
    std::mem::forget(dir);
    cupboard
}

/// `temp_cupboard`, plus `shelf_name` opened (or created) on it.
pub fn temp_cupboard_with_shelf(shelf_name: &str) -> (Cupboard, Arc<Shelf>) {
    let cupboard = temp_cupboard();
    let shelf = cupboard
        .get_shelf(shelf_name, ShelfOpenOptions::default())
        .expect("open shelf");
    (cupboard, shelf)
}

/// The "Book" shape used across this workspace's scenario tests.
pub fn book_shape() -> Shape {
    Shape::new()
        .field("isbn", FieldIndex::Unique)
        .field("title", FieldIndex::Any)
        .field("year", FieldIndex::None)
}

/// Field values for a handful of sample books, in publication order.
pub fn sample_books() -> Vec<Vec<(String, Value)>> {
    vec![
        book_fields("000-1", "Foundation", 1951),
        book_fields("000-2", "Dune", 1965),
        book_fields("000-3", "Neuromancer", 1984),
        book_fields("000-4", "Snow Crash", 1992),
    ]
}

fn book_fields(isbn: &str, title: &str, year: i64) -> Vec<(String, Value)> {
    vec![
        ("isbn".to_string(), Value::Text(isbn.to_string())),
        ("title".to_string(), Value::Text(title.to_string())),
        ("year".to_string(), Value::Int(year)),
    ]
}
