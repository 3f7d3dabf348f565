use super::*;
use common::EngineConfig;
use cupboard::ShelfOpenOptions;
use tempfile::tempdir;
use types::Value;

fn test_cupboard() -> Cupboard {
    let dir = tempdir().unwrap();
    let config = EngineConfig::builder()
        .data_dir(dir.path().to_path_buf())
        .build();
    let cupboard = Cupboard::open(dir.path(), config).unwrap();
    std::mem::forget(dir);
    cupboard
}

fn put_book(cupboard: &Cupboard, shelf: &Shelf, title: &str, isbn: &str, year: i64) {
    let mut record = Record::new();
    record.set("title", Value::Text(title.to_string()));
    record.set("isbn", Value::Text(isbn.to_string()));
    record.set("year", Value::Int(year));
    record.meta.shelf_name = Some(shelf.name.clone());
    record.meta.unique_indexes.insert("isbn".to_string());
    record.meta.any_indexes.insert("title".to_string());
    record.meta.any_indexes.insert("year".to_string());

    cupboard.get_index(shelf, "isbn", IndexOpenOptions { sorted_duplicates: Some(false) }).unwrap();
    cupboard.get_index(shelf, "title", IndexOpenOptions { sorted_duplicates: Some(true) }).unwrap();
    cupboard.get_index(shelf, "year", IndexOpenOptions { sorted_duplicates: Some(true) }).unwrap();

    let key = record.primary_key().as_bytes().to_vec();
    let bytes = bincode::serde::encode_to_vec(&record, bincode_config()).unwrap();

    let mut txn = kvengine::Txn::begin(cupboard.env(), kvengine::IsolationLevel::Serializable).unwrap();
    txn.put(&shelf.name, key, bytes).unwrap();
    txn.commit().unwrap();
}

#[test]
fn equality_clauses_use_the_natural_join_strategy() {
    let clauses = vec![Clause::new("isbn", Op::Eq, Value::Text("a".into()))];
    assert_eq!(choose_strategy(&clauses), Strategy::NaturalJoin);
}

#[test]
fn a_range_clause_uses_the_range_join_strategy() {
    let clauses = vec![Clause::new("year", Op::Ge, Value::Int(1960))];
    assert_eq!(choose_strategy(&clauses), Strategy::RangeJoin);
}

#[test]
fn natural_join_finds_the_record_matching_every_equality_clause() {
    let cupboard = test_cupboard();
    let shelf = cupboard.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    put_book(&cupboard, &shelf, "Dune", "001", 1965);
    put_book(&cupboard, &shelf, "Dune", "002", 1999);

    let results = query(
        &cupboard,
        &shelf,
        &[
            Clause::new("title", Op::Eq, Value::Text("Dune".into())),
            Clause::new("isbn", Op::Eq, Value::Text("001".into())),
        ],
        QueryOptions::default(),
    )
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("isbn"), Some(&Value::Text("001".into())));
}

#[test]
fn range_join_filters_by_the_dominating_clause_then_every_other_clause() {
    let cupboard = test_cupboard();
    let shelf = cupboard.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    put_book(&cupboard, &shelf, "Dune", "001", 1965);
    put_book(&cupboard, &shelf, "Foundation", "002", 1951);
    put_book(&cupboard, &shelf, "Neuromancer", "003", 1984);

    let results = query(
        &cupboard,
        &shelf,
        &[Clause::new("year", Op::Ge, Value::Int(1960))],
        QueryOptions::default(),
    )
    .unwrap();

    let mut isbns: Vec<_> = results
        .iter()
        .map(|r| r.get("isbn").cloned().unwrap())
        .collect();
    isbns.sort_by_key(|v| match v {
        Value::Text(s) => s.clone(),
        _ => unreachable!(),
    });
    assert_eq!(
        isbns,
        vec![Value::Text("001".into()), Value::Text("003".into())]
    );
}

#[test]
fn limit_stops_the_driver_from_materializing_further_matches() {
    let cupboard = test_cupboard();
    let shelf = cupboard.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    put_book(&cupboard, &shelf, "Dune", "001", 1965);
    put_book(&cupboard, &shelf, "Foundation", "002", 1970);
    put_book(&cupboard, &shelf, "Neuromancer", "003", 1984);

    let results = query(
        &cupboard,
        &shelf,
        &[Clause::new("year", Op::Ge, Value::Int(1960))],
        QueryOptions {
            limit: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(results.len(), 2);
}

#[test]
fn an_empty_clause_list_is_rejected() {
    let cupboard = test_cupboard();
    let shelf = cupboard.get_shelf("books", ShelfOpenOptions::default()).unwrap();
    let result = query(&cupboard, &shelf, &[], QueryOptions::default());
    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
}
