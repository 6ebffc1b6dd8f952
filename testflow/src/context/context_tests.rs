//! Scope tests across chains of derived contexts.

use super::TestContext;
use crate::variables::FunctionLibrary;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_isolated_child_of_shared_child_keeps_parent_untouched() {
    let root = TestContext::new();
    root.set_variable("level", "root");

    let shared = root.derive(false);
    let isolated = shared.derive(true);
    isolated.set_variable("level", "isolated");

    assert_eq!(root.variable("level").unwrap(), json!("root"));
    assert_eq!(shared.variable("level").unwrap(), json!("root"));
}

#[test]
fn test_shared_child_of_isolated_child_writes_to_isolated_store() {
    let root = TestContext::new();
    let isolated = root.derive(true);
    let shared = isolated.derive(false);

    shared.set_variable("written", true);

    assert!(isolated.has_variable("written"));
    assert!(!root.has_variable("written"));
}

#[test]
fn test_snapshot_is_taken_at_derive_time() {
    let root = TestContext::new();
    root.set_variable("a", 1);
    let isolated = root.derive(true);
    root.set_variable("b", 2);

    assert!(isolated.has_variable("a"));
    assert!(!isolated.has_variable("b"));
}

#[test]
fn test_structured_values_survive_isolation() {
    let root = TestContext::new();
    root.set_variable("order", json!({"id": 7, "lines": [1, 2]}));

    let isolated = root.derive(true);
    assert_eq!(isolated.variable("order").unwrap()["lines"], json!([1, 2]));
}

#[test]
fn test_custom_library_is_inherited_by_derived_contexts() {
    let library = FunctionLibrary::builtin().with_function("answer", |_, _| Ok("42".to_string()));
    let root = TestContext::new().with_functions(Arc::new(library));

    let child = root.derive(true).derive(false);
    assert_eq!(child.resolve("core:answer()").unwrap(), "42");
}

#[test]
fn test_validate_resolves_expected_value_in_scope() {
    let root = TestContext::new();
    let child = root.derive(true);
    child.set_variable("status", "OK");

    assert!(child.validate("status", "${status}", "OK").is_ok());
    assert!(root.validate("status", "${status}", "OK").is_err());
}
