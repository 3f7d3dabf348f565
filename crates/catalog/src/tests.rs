use super::*;
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
fn validate_name_rejects_colon_and_reserved_name() {
    assert!(validate_name("books").is_ok());
    assert!(matches!(
        validate_name("book:shelf"),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        validate_name(CATALOG_DB_NAME),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn shelf_options_round_trip_through_a_transaction() {
    let env = test_env();
    let catalog = Catalog::open(&env).unwrap();
    assert_eq!(catalog.shelf_options("books").unwrap(), None);

    let mut txn = Txn::begin(&env, IsolationLevel::Serializable).unwrap();
    catalog
        .put_shelf_options(&mut txn, "books", &ShelfOptions { read_only: false })
        .unwrap();
    txn.commit().unwrap();

    assert_eq!(
        catalog.shelf_options("books").unwrap(),
        Some(ShelfOptions { read_only: false })
    );
}

#[test]
fn index_entries_scopes_to_the_named_shelf() {
    let env = test_env();
    let catalog = Catalog::open(&env).unwrap();

    let mut txn = Txn::begin(&env, IsolationLevel::Serializable).unwrap();
    catalog
        .put_index_options(&mut txn, "books", "isbn", &IndexOptions { sorted_duplicates: false })
        .unwrap();
    catalog
        .put_index_options(&mut txn, "books", "title", &IndexOptions { sorted_duplicates: true })
        .unwrap();
    catalog
        .put_index_options(&mut txn, "authors", "name", &IndexOptions { sorted_duplicates: true })
        .unwrap();
    txn.commit().unwrap();

    let mut entries = catalog.index_entries("books").unwrap();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        entries,
        vec![
            ("isbn".to_string(), IndexOptions { sorted_duplicates: false }),
            ("title".to_string(), IndexOptions { sorted_duplicates: true }),
        ]
    );
}

#[test]
fn remove_shelf_entries_deletes_shelf_and_its_indices_only() {
    let env = test_env();
    let catalog = Catalog::open(&env).unwrap();

    let mut txn = Txn::begin(&env, IsolationLevel::Serializable).unwrap();
    catalog
        .put_shelf_options(&mut txn, "books", &ShelfOptions::default())
        .unwrap();
    catalog
        .put_index_options(&mut txn, "books", "isbn", &IndexOptions { sorted_duplicates: false })
        .unwrap();
    catalog
        .put_shelf_options(&mut txn, "authors", &ShelfOptions::default())
        .unwrap();
    txn.commit().unwrap();

    catalog.remove_shelf_entries("books").unwrap();

    assert_eq!(catalog.shelf_options("books").unwrap(), None);
    assert!(catalog.index_entries("books").unwrap().is_empty());
    assert_eq!(catalog.shelf_options("authors").unwrap(), Some(ShelfOptions::default()));
}
