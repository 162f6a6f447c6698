use crate::evaluator::functions::FunctionRegistry;
use crate::evaluator::{Value, YearMonth};
use rust_decimal::Decimal;

fn text(s: &str) -> Value {
    Value::text(s)
}

fn call(name: &str, args: &[Value]) -> Value {
    FunctionRegistry::new().call(name, args).unwrap()
}

#[test]
fn test_legacy_flags() {
    let registry = FunctionRegistry::new();
    for name in [
        "equals",
        "notEquals",
        "greaterThan",
        "greaterOrEqual",
        "lessThan",
        "lessOrEqual",
        "and",
        "or",
        "contains",
    ] {
        assert!(registry.legacy(name).is_some(), "{} should be legacy", name);
    }
    assert!(registry.legacy("valueOr").is_none());
    assert!(registry.get("valueOr").is_some());
}

#[test]
fn test_arity_is_checked() {
    let registry = FunctionRegistry::new();
    let err = registry.call("between", &[text("1")]).unwrap_err();
    assert!(err.contains("between() takes 3 argument(s), got 1"));

    let err = registry.call("in", &[text("1")]).unwrap_err();
    assert!(err.contains("at least 2"));

    let err = registry.call("ym", &[]).unwrap_err();
    assert!(err.contains("1 to 2"));
}

#[test]
fn test_unknown_function() {
    let err = FunctionRegistry::new().call("nope", &[]).unwrap_err();
    assert!(err.contains("Unknown function 'nope'"));
}

#[test]
fn test_relational_functions_ignore_unanswered() {
    assert_eq!(call("greaterThan", &[text(""), text("3")]), Value::Bool(false));
    assert_eq!(call("lessThan", &[Value::Null, text("3")]), Value::Bool(false));
    assert_eq!(call("greaterOrEqual", &[text("3"), text("3")]), Value::Bool(true));
    assert_eq!(call("lessOrEqual", &[text("10"), text("9")]), Value::Bool(false));
}

#[test]
fn test_existence_checks() {
    assert_eq!(call("answered", &[text("x")]), Value::Bool(true));
    assert_eq!(call("answered", &[Value::List(vec![])]), Value::Bool(false));
    assert_eq!(call("empty", &[Value::Null]), Value::Bool(true));
    assert_eq!(call("not", &[Value::Bool(true)]), Value::Bool(false));
}

#[test]
fn test_value_or_default() {
    assert_eq!(call("valueOr", &[Value::Null, text("n/a")]), text("n/a"));
    assert_eq!(call("valueOr", &[text("7"), text("n/a")]), text("7"));
}

#[test]
fn test_set_membership() {
    assert_eq!(
        call("in", &[text("3"), text("1"), text("2"), text("3")]),
        Value::Bool(true)
    );
    assert_eq!(call("in", &[text("4"), text("1"), text("2")]), Value::Bool(false));
}

#[test]
fn test_numeric_range() {
    assert_eq!(call("between", &[text("5"), text("1"), text("10")]), Value::Bool(true));
    assert_eq!(call("between", &[text("10"), text("1"), text("10")]), Value::Bool(true));
    assert_eq!(call("between", &[text("11"), text("1"), text("10")]), Value::Bool(false));
    assert_eq!(call("between", &[text(""), text("1"), text("10")]), Value::Bool(false));
}

#[test]
fn test_count_and_num() {
    let selection = Value::List(vec![text("1"), text("4")]);
    assert_eq!(call("count", &[selection]), Value::Number(Decimal::from(2)));
    assert_eq!(call("count", &[Value::Null]), Value::Number(Decimal::ZERO));
    assert_eq!(call("num", &[text(" 12 ")]), Value::Number(Decimal::from(12)));
    assert_eq!(call("num", &[text("twelve")]), Value::Null);
}

#[test]
fn test_contains_on_text_and_lists() {
    assert_eq!(call("contains", &[text("blue green"), text("green")]), Value::Bool(true));
    assert_eq!(
        call("contains", &[Value::List(vec![text("1"), text("3")]), text("3")]),
        Value::Bool(true)
    );
    assert_eq!(call("contains", &[Value::Null, text("3")]), Value::Bool(false));
}

#[test]
fn test_month_functions() {
    assert_eq!(
        call("addMonths", &[text("2024-11"), text("3")]),
        Value::YearMonth(YearMonth::new(2025, 2).unwrap())
    );
    assert_eq!(
        call("monthsBetween", &[text("2024-01"), text("2024-07")]),
        Value::Number(Decimal::from(6))
    );
    assert!(FunctionRegistry::new()
        .call("ym", &[text("2024"), text("13")])
        .is_err());
}
