use super::*;
use std::cmp::Ordering::{Equal, Greater, Less};

#[test]
fn cmp_same_type_works() {
    assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
    assert_eq!(Value::Int(2).cmp_same_type(&Value::Int(2)), Some(Equal));
    assert_eq!(Value::Int(3).cmp_same_type(&Value::Int(2)), Some(Greater));
    assert_eq!(
        Value::Text("a".into()).cmp_same_type(&Value::Text("b".into())),
        Some(Less)
    );
}

#[test]
fn truthiness_is_strict() {
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::Int(1).as_bool(), None);
    assert_eq!(Value::Null.as_bool(), None);
}

#[test]
fn comparisons_require_same_type() {
    assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
    assert_eq!(Value::Null.cmp_same_type(&Value::Null), None);
}

#[test]
fn equality_requires_same_type() {
    assert_eq!(Value::Int(1).eq_same_type(&Value::Int(1)), Some(true));
    assert_eq!(Value::Int(1).eq_same_type(&Value::Bool(true)), None);
}

#[test]
fn serde_round_trip_stability() {
    let id = uuid::Uuid::new_v4();
    for v in [
        Value::Int(42),
        Value::Text("hello".into()),
        Value::Bool(false),
        Value::Uuid(id),
        Value::Null,
    ] {
        let encoded = serde_json::to_string(&v).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(v, decoded);
    }
}

#[test]
fn uuid_values_compare_and_encode() {
    let a = uuid::Uuid::from_u128(1);
    let b = uuid::Uuid::from_u128(2);
    assert_eq!(Value::Uuid(a).cmp_same_type(&Value::Uuid(b)), Some(Less));
    assert_ne!(Value::Uuid(a).encode_key(), Value::Uuid(b).encode_key());
}

#[test]
fn encode_key_preserves_int_ordering() {
    let mut values = vec![-100i64, -1, 0, 1, 100, i64::MIN, i64::MAX];
    let mut keyed: Vec<_> = values.iter().map(|i| Value::Int(*i).encode_key()).collect();
    keyed.sort();
    values.sort();
    let resorted_ints: Vec<i64> = keyed
        .iter()
        .map(|k| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&k[1..9]);
            (u64::from_be_bytes(buf) ^ (1u64 << 63)) as i64
        })
        .collect();
    assert_eq!(resorted_ints, values);
}

#[test]
fn encode_key_distinguishes_variants() {
    let int_key = Value::Int(0).encode_key();
    let text_key = Value::Text(String::new()).encode_key();
    let bool_key = Value::Bool(false).encode_key();
    let null_key = Value::Null.encode_key();
    assert_ne!(int_key[0], text_key[0]);
    assert_ne!(text_key[0], bool_key[0]);
    assert_ne!(bool_key[0], null_key[0]);
}

#[test]
fn record_set_get_remove_roundtrip() {
    let mut record = Record::new();
    let pk = record.primary_key();
    assert!(record.set("title", Value::Text("Dune".into())).is_none());
    assert_eq!(record.get("title"), Some(&Value::Text("Dune".into())));
    let old = record.set("title", Value::Text("Dune Messiah".into()));
    assert_eq!(old, Some(Value::Text("Dune".into())));
    let removed = record.remove("title");
    assert_eq!(removed, Some(Value::Text("Dune Messiah".into())));
    assert_eq!(record.get("title"), None);
    assert_eq!(record.primary_key(), pk, "passoc/pdissoc must not touch the primary key");
}

#[test]
fn record_with_fields_builds_a_populated_record() {
    let record = Record::with_fields([
        ("title".to_string(), Value::Text("Dune".into())),
        ("year".to_string(), Value::Int(1965)),
    ]);
    assert_eq!(record.fields().len(), 2);
    assert_eq!(record.get("year"), Some(&Value::Int(1965)));
    assert_eq!(record.shelf_name(), None);
}

proptest::proptest! {
    #[test]
    fn order_is_antisymmetric(a: i64, b: i64) {
        let forward = Value::Int(a).cmp_same_type(&Value::Int(b));
        let backward = Value::Int(b).cmp_same_type(&Value::Int(a));
        proptest::prop_assert_eq!(forward, backward.map(|o| o.reverse()));
    }

    #[test]
    fn eq_reflexive(a: i64) {
        proptest::prop_assert_eq!(Value::Int(a).eq_same_type(&Value::Int(a)), Some(true));
    }

    #[test]
    fn text_cmp_matches_std(a: String, b: String) {
        let expected = a.cmp(&b);
        proptest::prop_assert_eq!(
            Value::Text(a).cmp_same_type(&Value::Text(b)),
            Some(expected)
        );
    }
}
