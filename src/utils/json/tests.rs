use super::*;
use serde_json::json;

#[test]
fn sorts_keys() {
    let a = json!({"z": 1, "a": 2, "m": 3});
    let b = json!({"a": 2, "m": 3, "z": 1});
    assert_eq!(canonical_json(&a), canonical_json(&b));
}

#[test]
fn sorts_nested_objects() {
    let a = json!({"outer": {"z": 1, "a": 2}});
    let b = json!({"outer": {"a": 2, "z": 1}});
    assert_eq!(canonical_json(&a), canonical_json(&b));
}

#[test]
fn preserves_array_order() {
    let a = json!({"items": [3, 1, 2]});
    let b = json!({"items": [1, 2, 3]});
    assert_ne!(canonical_json(&a), canonical_json(&b));
}

#[test]
fn scalars_pass_through() {
    assert_eq!(canonical_json(&json!(42)), "42");
    assert_eq!(canonical_json(&json!("hello")), "\"hello\"");
    assert_eq!(canonical_json(&json!(null)), "null");
    assert_eq!(canonical_json(&json!(true)), "true");
}

#[test]
fn objects_inside_arrays_are_sorted() {
    let a = json!({"list": [{"z": 1, "a": 2}]});
    let b = json!({"list": [{"a": 2, "z": 1}]});
    assert_eq!(canonical_json(&a), canonical_json(&b));
}
