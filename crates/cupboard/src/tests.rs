use super::*;
use tempfile::tempdir;
use types::Value;

fn open(dir: &std::path::Path) -> Cupboard {
    Cupboard::open(dir.to_path_buf(), EngineConfig::default()).unwrap()
}

#[test]
fn opening_an_empty_directory_creates_the_default_shelf() {
    let dir = tempdir().unwrap();
    let cb = open(dir.path());
    assert_eq!(cb.list_shelves(), vec![DEFAULT_SHELF.to_string()]);
}

#[test]
fn reopening_restores_shelves_and_index_kinds() {
    let dir = tempdir().unwrap();
    {
        let cb = open(dir.path());
        let shelf = cb.get_shelf("books", ShelfOpenOptions::default()).unwrap();
        cb.get_index(
            &shelf,
            "isbn",
            IndexOpenOptions {
                sorted_duplicates: Some(false),
            },
        )
        .unwrap();
        cb.get_index(
            &shelf,
            "title",
            IndexOpenOptions {
                sorted_duplicates: Some(true),
            },
        )
        .unwrap();
        cb.close();
    }

    let cb = open(dir.path());
    let mut shelves = cb.list_shelves();
    shelves.sort();
    assert_eq!(shelves, vec![DEFAULT_SHELF.to_string(), "books".to_string()]);

    let shelf = cb.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    assert_eq!(shelf.index_kind("isbn"), Some(IndexKind::Unique));
    assert_eq!(shelf.index_kind("title"), Some(IndexKind::Any));
}

#[test]
fn list_shelves_never_exposes_the_catalog_or_index_names() {
    let dir = tempdir().unwrap();
    let cb = open(dir.path());
    let shelf = cb.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    cb.get_index(&shelf, "isbn", IndexOpenOptions::default()).unwrap();

    for name in cb.list_shelves() {
        assert!(!name.contains(':'));
        assert_ne!(name, catalog::CATALOG_DB_NAME);
    }
}

#[test]
fn remove_shelf_drops_primary_secondaries_and_catalog_entries() {
    let dir = tempdir().unwrap();
    let cb = open(dir.path());
    let shelf = cb.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    cb.get_index(
        &shelf,
        "isbn",
        IndexOpenOptions {
            sorted_duplicates: Some(false),
        },
    )
    .unwrap();
    cb.get_index(
        &shelf,
        "title",
        IndexOpenOptions {
            sorted_duplicates: Some(true),
        },
    )
    .unwrap();

    cb.remove_shelf("books").unwrap();

    assert!(!cb.list_shelves().contains(&"books".to_string()));
    assert!(!cb.env().database_exists("books"));
    assert!(!cb.env().database_exists("books:isbn"));
    assert!(!cb.env().database_exists("books:title"));
    assert!(cb.catalog.shelf_options("books").unwrap().is_none());
    assert!(cb.catalog.index_entries("books").unwrap().is_empty());
}

#[test]
fn shelf_and_index_names_reject_reserved_forms() {
    let dir = tempdir().unwrap();
    let cb = open(dir.path());
    assert!(matches!(
        cb.get_shelf("a:b", ShelfOpenOptions::default()),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        cb.get_shelf(catalog::CATALOG_DB_NAME, ShelfOpenOptions::default()),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn default_key_creator_indexes_by_record_field() {
    let dir = tempdir().unwrap();
    let cb = open(dir.path());
    let shelf = cb.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    cb.get_index(
        &shelf,
        "isbn",
        IndexOpenOptions {
            sorted_duplicates: Some(false),
        },
    )
    .unwrap();

    let record = Record::with_fields([("isbn".to_string(), Value::Text("978-0".into()))]);
    let bytes = bincode::serde::encode_to_vec(&record, bincode_config()).unwrap();

    let mut txn = Txn::begin(cb.env(), IsolationLevel::Serializable).unwrap();
    txn.put("books", record.primary_key().as_bytes().to_vec(), bytes)
        .unwrap();
    txn.commit().unwrap();

    let indexed = cb.env().get("books:isbn", &Value::Text("978-0".into()).encode_key());
    assert_eq!(indexed, Some(record.primary_key().as_bytes().to_vec()));
}
